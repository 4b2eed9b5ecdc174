use std::{collections::BTreeMap, sync::OnceLock};

use bon::Builder;
use log::debug;

use super::code;

/// Process-wide engine limits.
///
/// ```
/// use ib_pcre::engine::Limits;
///
/// let limits = Limits::builder().nest_limit(100).build();
/// assert_eq!(limits.size_limit, Limits::default().size_limit);
/// ```
#[derive(Builder, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum nesting depth of groups, classes and repetitions in a pattern.
    #[builder(default = 250)]
    pub nest_limit: u32,
    /// Heap limit in bytes of a compiled program.
    #[builder(default = 10 * (1 << 20))]
    pub size_limit: usize,
    /// Capacity in bytes of the lazy DFA cache built by [`StudyOptions::JIT_COMPILE`](crate::StudyOptions::JIT_COMPILE).
    #[builder(default = 2 * (1 << 20))]
    pub cache_capacity: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self::builder().build()
    }
}

static LIMITS: OnceLock<Limits> = OnceLock::new();

/// Set the limits used by every compilation and search of this process.
///
/// Must be called before the first pattern is compiled or loaded. Fails and returns `limits` back if the limits are already in effect.
pub fn init(limits: Limits) -> Result<(), Limits> {
    LIMITS.set(limits)?;
    debug!("engine limits: {limits:?}");
    Ok(())
}

/// The limits in effect. Fixes them to the defaults if [`init()`] has not been called.
pub fn limits() -> &'static Limits {
    LIMITS.get_or_init(Limits::default)
}

/// A value of [`config()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

/// Build configuration of the engine, keyed by PCRE's configuration names.
///
/// The engine has no backtracking step or recursion limits, so PCRE's `match_limit` and `match_limit_recursion` are absent. Its own bounds are reported instead: `size_limit` is [`Limits::size_limit`] and `cache_capacity` is [`Limits::cache_capacity`].
///
/// ```
/// use ib_pcre::engine::{config, ConfigValue};
///
/// let config = config();
/// assert_eq!(config["utf8"], ConfigValue::Bool(true));
/// assert_eq!(config["newline"], ConfigValue::Int(10));
/// assert!(!config.contains_key("match_limit"));
/// ```
pub fn config() -> BTreeMap<&'static str, ConfigValue> {
    use ConfigValue::*;

    let limits = limits();
    let int = |n: usize| Int(i64::try_from(n).unwrap_or(i64::MAX));
    BTreeMap::from([
        ("version", Str(env!("CARGO_PKG_VERSION"))),
        ("utf8", Bool(true)),
        ("unicode_properties", Bool(true)),
        ("jit", Bool(true)),
        ("jit_target", Str("lazy DFA")),
        // LF
        ("newline", Int(10)),
        // \R matches any Unicode newline
        ("bsr", Int(0)),
        ("link_size", Int(code::LINK_SIZE as i64)),
        ("parens_limit", Int(limits.nest_limit.into())),
        ("size_limit", int(limits.size_limit)),
        ("cache_capacity", int(limits.cache_capacity)),
        ("stack_recursion", Bool(false)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys() {
        let config = config();
        assert_eq!(config.len(), 12);
        assert_eq!(config["stack_recursion"], ConfigValue::Bool(false));
        assert_eq!(config["link_size"], ConfigValue::Int(4));
        assert_eq!(
            config["parens_limit"],
            ConfigValue::Int(limits().nest_limit.into())
        );
        assert!(matches!(config["version"], ConfigValue::Str(v) if !v.is_empty()));
        assert_eq!(
            config["size_limit"],
            ConfigValue::Int(limits().size_limit as i64)
        );
        assert_eq!(
            config["cache_capacity"],
            ConfigValue::Int(limits().cache_capacity as i64)
        );
        assert!(!config.contains_key("match_limit_recursion"));
    }

    #[test]
    fn init_once() {
        // Whatever was in effect first stays in effect
        let current = *limits();
        assert_eq!(init(Limits::builder().nest_limit(1).build()).unwrap_err().nest_limit, 1);
        assert_eq!(*limits(), current);
    }
}
