//! `parley profiles`: list configured profiles.

use parley_config::AppConfig;

pub fn run(config: &AppConfig) {
    if config.profiles.is_empty() {
        let path = AppConfig::config_dir().join("config.toml");
        println!("No profiles configured. Add some to {}", path.display());
        return;
    }

    println!("{:<12} {:<10} {:<28} IDENTITY", "NAME", "FAMILY", "MODEL");
    for (name, profile) in &config.profiles {
        let marker = if *name == config.default_profile { " (default)" } else { "" };
        println!(
            "{:<12} {:<10} {:<28} {}{}",
            name,
            profile.family().to_string(),
            profile.model(),
            profile.identity(),
            marker
        );
    }
}
