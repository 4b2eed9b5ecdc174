use ib_pcre::{Options, Pattern, StudyOptions};
use widestring::u16str;

fn main() -> ib_pcre::Result<()> {
    let pattern = Pattern::compile(r"la vie est drôle", Options::CASELESS)?;
    assert!(pattern.is_match("LA VIE EST DRÔLE")?);

    // Offsets are in the subject's own units
    let pattern = Pattern::new(r"(?P<name>\w+)@(?P<host>\w+)")?;
    let m = pattern.search(u16str!("📧 mail: ann@example")).call()?.unwrap();
    assert_eq!(m.range(), 9..20);
    assert_eq!(m.group("host")?.unwrap(), "example");
    assert_eq!(m.expand("{host}/{name}")?, "example/ann");

    // Latin-1 bytes are transcoded, offsets stay in bytes
    let pattern = Pattern::new(r"\w+")?;
    let words: Vec<_> = pattern
        .find_iter(b"d\xe9j\xe0 vu")
        .map(|m| m.map(|m| m.range()))
        .collect::<Result<_, _>>()?;
    assert_eq!(words, [0..4, 5..7]);

    let mut pattern = Pattern::new(r"(\d+)-(\d+)")?;
    pattern.study(StudyOptions::JIT_COMPILE)?;
    assert_eq!(pattern.sub(r"{2}-{1}", "1-2, 3-4", 0)?, "2-1, 4-3");

    // Compiled code survives without the source
    let loaded = Pattern::load(&pattern.dump()?)?;
    assert_eq!(loaded, pattern);
    assert!(loaded.source().is_none());

    Ok(())
}
