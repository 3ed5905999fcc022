use std::path::Path;

use figment::Jail;
use tiercache_core::config::{resolve_with_base, Config};
use tiercache_core::types::{Domain, DomainFilter, QaRecord, DOMAIN_KEY};

#[test]
fn empty_config_yields_defaults() {
    Jail::expect_with(|_jail| {
        let settings = Config::load().map_err(|e| e.to_string())?.settings().map_err(|e| e.to_string())?;
        assert_eq!(settings.domains.capacity, 1);
        assert_eq!(settings.domains.initial, vec!["lunar".to_string()]);
        assert!((settings.canonical.threshold - 0.85).abs() < 1e-6);
        assert!((settings.canonical.negative_threshold - 0.90).abs() < 1e-6);
        assert!((settings.qa_index.threshold - 0.75).abs() < 1e-6);
        assert_eq!(settings.query_cache.capacity, 1000);
        assert_eq!(settings.query_cache.eviction_buffer, 10);
        Ok(())
    });
}

#[test]
fn env_file_and_variables_layer_over_base_file() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", r#"
            [domains]
            capacity = 2
            initial = ["lunar", "ifs"]

            [query_cache]
            capacity = 50
        "#)?;
        jail.create_file("config.test.toml", r#"
            [query_cache]
            threshold = 0.9
        "#)?;
        jail.set_env("RUST_ENV", "test");
        jail.set_env("APP_QUERY_CACHE__CAPACITY", "25");

        let settings = Config::load().map_err(|e| e.to_string())?.settings().map_err(|e| e.to_string())?;
        assert_eq!(settings.domains.capacity, 2);
        assert_eq!(settings.domains.initial, vec!["lunar".to_string(), "ifs".to_string()]);
        assert!((settings.query_cache.threshold - 0.9).abs() < 1e-6);
        assert_eq!(settings.query_cache.capacity, 25, "env var wins");
        assert_eq!(settings.query_cache.eviction_buffer, 10, "untouched keys keep defaults");
        Ok(())
    });
}

#[test]
fn invalid_settings_are_rejected() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[domains]\ninitial = [\"alchemy\"]\n")?;
        assert!(Config::load().is_err(), "initial domain outside the available set");
        jail.create_file("config.toml", "[domains]\ncapacity = 0\n")?;
        assert!(Config::load().is_err(), "zero capacity");
        jail.create_file("config.toml", "[qa_index]\nthreshold = 1.5\n")?;
        assert!(Config::load().is_err(), "threshold out of range");
        Ok(())
    });
}

#[test]
fn relative_paths_resolve_against_base() {
    let base = Path::new("/var/lib/tiercache");
    assert_eq!(resolve_with_base(base, "qa.jsonl"), base.join("qa.jsonl"));
    assert_eq!(resolve_with_base(base, "/tmp/qa.jsonl"), Path::new("/tmp/qa.jsonl"));
}

#[test]
fn domain_filter_shapes() {
    assert_eq!(DomainFilter::from_domains(&[]), DomainFilter::Any);
    assert_eq!(DomainFilter::Any.to_json(), serde_json::json!({}));
    assert!(DomainFilter::Any.to_sql().is_none());
    assert!(DomainFilter::Any.matches(None));

    let f = DomainFilter::from_domains(&[Domain::new("lunar"), Domain::new("Tarot")]);
    assert_eq!(f.to_json(), serde_json::json!({"domain": {"in": ["lunar", "tarot"]}}));
    assert_eq!(f.to_sql().as_deref(), Some("domain IN ('lunar','tarot')"));
    assert!(f.matches(Some("tarot")));
    assert!(!f.matches(Some("ifs")));
    assert!(!f.matches(None));
}

#[test]
fn qa_record_travels_as_question_plus_metadata() {
    let record = QaRecord {
        id: "lunar_qa_1".to_string(),
        question: "What is a blue moon?".to_string(),
        answer: "The second full moon in one calendar month.".to_string(),
        domain: Domain::new("lunar"),
        source: "lunar_qa.md".to_string(),
        created_at: chrono::Utc::now(),
    };
    let item = record.to_stored_item();
    assert_eq!(item.text, record.question, "only the question is indexed text");
    assert_eq!(item.meta.get(DOMAIN_KEY).map(String::as_str), Some("lunar"));
    let back = QaRecord::from_stored_item(&item).expect("qa item");
    assert_eq!(back.answer, record.answer);
    assert_eq!(back.created_at.timestamp(), record.created_at.timestamp());

    let mut plain = item.clone();
    plain.meta.remove("answer");
    assert!(QaRecord::from_stored_item(&plain).is_none());
}
