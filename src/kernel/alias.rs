//! Class-name aliasing for the compact data form.
//!
//! The first occurrence of a class name in a data file is written with
//! an `@` sentinel (`class="@Detector"`); every later occurrence uses a
//! generated short id. Reader and writer run the same shortest-first
//! generator, so the mapping never appears in the file itself.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

const SYMBOLS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generates unique strings, shortest first: `0`, `1`, …, `Z`, `00`,
/// `01`, … — base-62 with explicit widths.
#[derive(Debug, Default)]
pub(crate) struct NameTable {
    count: u64,
}

impl NameTable {
    pub(crate) fn get(&mut self) -> SmolStr {
        let index = self.count;
        self.count += 1;

        let base = SYMBOLS.len() as u64;
        let mut n = index;
        let mut width = 1usize;
        let mut block = base;
        while n >= block {
            n -= block;
            block *= base;
            width += 1;
        }
        let mut buf = vec![b'0'; width];
        for slot in buf.iter_mut().rev() {
            *slot = SYMBOLS[(n % base) as usize];
            n /= base;
        }
        SmolStr::new(String::from_utf8_lossy(&buf))
    }
}

/// How to emit a class name in the compact form.
pub(crate) enum ClassToken {
    /// First occurrence: write `@<name>` and remember the alias.
    First,
    /// Seen before: write the generated alias.
    Alias(SmolStr),
}

#[derive(Debug, Default)]
pub(crate) struct AliasTable {
    names: NameTable,
    /// class name → alias, writer side.
    write_aliases: FxHashMap<SmolStr, SmolStr>,
    /// alias → class name, reader side.
    read_aliases: FxHashMap<SmolStr, SmolStr>,
}

impl AliasTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Token to emit for a class name.
    pub(crate) fn for_write(&mut self, class: &str) -> ClassToken {
        if let Some(alias) = self.write_aliases.get(class) {
            return ClassToken::Alias(alias.clone());
        }
        let alias = self.names.get();
        self.write_aliases.insert(SmolStr::new(class), alias);
        ClassToken::First
    }

    /// Class name behind a token from the wire: `@name` registers a new
    /// alias, a known alias resolves, anything else is a plain name.
    pub(crate) fn for_read(&mut self, token: &str) -> SmolStr {
        if let Some(name) = token.strip_prefix('@') {
            let alias = self.names.get();
            let name = SmolStr::new(name);
            self.read_aliases.insert(alias, name.clone());
            return name;
        }
        self.read_aliases
            .get(token)
            .cloned()
            .unwrap_or_else(|| SmolStr::new(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_table_sequence() {
        let mut names = NameTable::default();
        assert_eq!(names.get(), "0");
        assert_eq!(names.get(), "1");
        for _ in 0..59 {
            names.get();
        }
        assert_eq!(names.get(), "Z");
        assert_eq!(names.get(), "00");
        assert_eq!(names.get(), "01");
    }

    #[test]
    fn test_round_trip_through_tables() {
        let mut writer = AliasTable::new();
        let mut reader = AliasTable::new();

        // writer side: first occurrence, then aliases
        assert!(matches!(writer.for_write("Detector"), ClassToken::First));
        let alias = match writer.for_write("Detector") {
            ClassToken::Alias(a) => a,
            ClassToken::First => panic!("second occurrence must alias"),
        };

        // reader side mirrors the generator
        assert_eq!(reader.for_read("@Detector"), "Detector");
        assert_eq!(reader.for_read(&alias), "Detector");
        // unknown tokens are plain class names
        assert_eq!(reader.for_read("Module"), "Module");
    }
}
