pub mod types;
pub mod utils;
pub mod env;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_type_ok() {
        let h = types::Health { ok: true };
        assert!(h.ok);
        assert_eq!(serde_json::to_string(&h).unwrap(), r#"{"ok":true}"#);
    }
}
