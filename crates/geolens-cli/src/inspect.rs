//! Read-only commands: `providers` and `rules`.

use std::path::Path;

use geolens_core::{load_rules, AppConfig, Dimension};
use geolens_providers::ProviderRegistry;

pub(crate) fn run_providers(config: &AppConfig) -> anyhow::Result<()> {
    let registry = ProviderRegistry::from_config(config)?;
    println!(
        "{:<12} {:<10} {:<32} {:<11} {:<6}",
        "PROVIDER", "AVAILABLE", "MODEL", "JSON MODE", "SEARCH"
    );
    for adapter in registry.all() {
        let caps = adapter.capabilities();
        println!(
            "{:<12} {:<10} {:<32} {:<11} {:<6}",
            adapter.name(),
            if adapter.is_available() { "yes" } else { "no" },
            adapter.model(),
            if caps.structured_output { "yes" } else { "no" },
            if caps.search { "yes" } else { "no" },
        );
    }
    Ok(())
}

pub(crate) fn run_rules(path: &Path) -> anyhow::Result<()> {
    let rules = load_rules(path)?;
    println!("{}: version {} is valid", path.display(), rules.version);
    println!("{} rules, pass mark {}", rules.rules.len(), rules.pass_mark);
    for dimension in Dimension::ALL {
        let count = rules
            .rules
            .iter()
            .filter(|r| r.dimension == dimension)
            .count();
        println!(
            "  {:<24} weight {:.2}  rules {count}",
            dimension.to_string(),
            rules.global_score_formula.weight(dimension)
        );
    }
    Ok(())
}
