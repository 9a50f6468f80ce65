//! Evaluates gameplay tags against a data-driven global modifier table.
//!
//! ```text
//! stats-probe <tag> <base> [<tag> <base> ...]
//! ```
mod config;

use std::rc::Rc;

use anyhow::{Context, Result, bail};
use config::ProbeConfig;
use stats_content::ContentFactory;
use stats_core::{GameplayTag, TaggedAttribute};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ProbeConfig::from_env();
    let queries = parse_queries(std::env::args().skip(1))?;

    let factory = ContentFactory::new(&config.data_dir);
    let settings = factory.load_config()?;
    let rounding = config.rounding.unwrap_or(settings.default_rounding);
    let registry = Rc::new(
        factory
            .build_registry()
            .with_context(|| format!("loading {}", config.data_dir.display()))?,
    );
    tracing::info!(
        scopes = registry.scopes().len(),
        modifiers = registry.len(),
        %rounding,
        "registry ready"
    );

    for (tag, base) in queries {
        let mut attribute = TaggedAttribute::new(tag.clone(), base);
        attribute.register(&registry);
        println!(
            "{tag}\tbase={base}\tvalue={}\trounded={}\tinjected={}",
            attribute.value(),
            rounding.apply(attribute.value()),
            attribute.injected_ids().len(),
        );
    }

    Ok(())
}

fn parse_queries(args: impl Iterator<Item = String>) -> Result<Vec<(GameplayTag, f32)>> {
    let args: Vec<String> = args.collect();
    if args.is_empty() || args.len() % 2 != 0 {
        bail!("usage: stats-probe <tag> <base> [<tag> <base> ...]");
    }
    args.chunks(2)
        .map(|pair| {
            let tag = GameplayTag::new(pair[0].as_str());
            if !tag.is_valid() {
                bail!("invalid tag {:?}", pair[0]);
            }
            let base = pair[1]
                .parse::<f32>()
                .with_context(|| format!("invalid base value {:?}", pair[1]))?;
            Ok((tag, base))
        })
        .collect()
}
