//! Option bit flags consumed by [`Pattern::compile()`](crate::Pattern::compile), [`Pattern::search()`](crate::Pattern::search) and [`Pattern::study()`](crate::Pattern::study).
//!
//! The bit values are the ones PCRE uses, so option words stored by hosts keep their meaning.
use bitflags::bitflags;

bitflags! {
    /// Compile and search options.
    ///
    /// Each phase only consumes the bits in its mask ([`Options::COMPILE`], [`Options::EXEC`]); other bits are ignored by that phase.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Options: u32 {
        /// Case-insensitive matching.
        const CASELESS = 0x0000_0001;
        /// `^` and `$` also match at line starts and ends.
        const MULTILINE = 0x0000_0002;
        /// `.` also matches `\n`.
        const DOTALL = 0x0000_0004;
        /// Free-spacing syntax: whitespace is ignored and `#` starts a comment.
        const EXTENDED = 0x0000_0008;
        /// The match can only start at the search start.
        const ANCHORED = 0x0000_0010;
        /// The subject start is not the beginning of a line, i.e. `^` does not match there.
        const NOTBOL = 0x0000_0080;
        /// The subject end is not the end of a line, i.e. `$` does not match there.
        const NOTEOL = 0x0000_0100;
        /// Invert the greediness of quantifiers.
        const UNGREEDY = 0x0000_0200;
        /// An empty string is not a valid match.
        const NOTEMPTY = 0x0000_0400;
        /// Byte subjects (and patterns) are already UTF-8, don't treat them as Latin-1.
        const UTF8 = 0x0000_0800;
        /// Skip UTF-8 validity checking.
        ///
        /// Set automatically whenever the string adapter produced or guaranteed the encoding itself.
        const NO_UTF8_CHECK = 0x0000_2000;
        /// An empty string at the search start is not a valid match.
        const NOTEMPTY_ATSTART = 0x1000_0000;
        /// Unicode properties for `\w`, `\d`, `\s` and `\b`.
        ///
        /// The engine is always Unicode-aware, so this is always part of the effective options.
        const UCP = 0x2000_0000;

        /// Bits consumed by compilation.
        const COMPILE = Self::CASELESS.bits()
            | Self::MULTILINE.bits()
            | Self::DOTALL.bits()
            | Self::EXTENDED.bits()
            | Self::ANCHORED.bits()
            | Self::UNGREEDY.bits()
            | Self::UTF8.bits()
            | Self::NO_UTF8_CHECK.bits()
            | Self::UCP.bits();
        /// Bits consumed by a search.
        const EXEC = Self::ANCHORED.bits()
            | Self::NOTBOL.bits()
            | Self::NOTEOL.bits()
            | Self::NOTEMPTY.bits()
            | Self::UTF8.bits()
            | Self::NO_UTF8_CHECK.bits()
            | Self::NOTEMPTY_ATSTART.bits();
    }
}

bitflags! {
    /// [`Pattern::study()`](crate::Pattern::study) options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StudyOptions: u32 {
        /// Also build the lazy DFA engine, the counterpart of PCRE's JIT.
        const JIT_COMPILE = 0x0001;
    }
}
