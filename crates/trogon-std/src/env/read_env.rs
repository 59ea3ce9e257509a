use std::env;

/// # Thread Safety
///
/// Does **not** require `Send + Sync`. Configuration is read once at startup,
/// so add the bounds at your call site if you need them.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, env::VarError>;
}

/// Reads a comma-separated list, trimming entries and dropping empty ones.
///
/// A missing variable and an empty value both yield an empty list.
pub fn read_list<E: ReadEnv>(env: &E, key: &str) -> Vec<String> {
    env.var(key)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::InMemoryEnv;

    #[test]
    fn read_list_missing_is_empty() {
        let env = InMemoryEnv::new();
        assert!(read_list(&env, "IDS").is_empty());
    }

    #[test]
    fn read_list_trims_and_drops_blanks() {
        let env = InMemoryEnv::new();
        env.set("IDS", " 1234 ,, 5678,  ");
        assert_eq!(read_list(&env, "IDS"), vec!["1234", "5678"]);
    }

    #[test]
    fn read_list_keeps_order() {
        let env = InMemoryEnv::new();
        env.set("IDS", "c,a,b");
        assert_eq!(read_list(&env, "IDS"), vec!["c", "a", "b"]);
    }
}
