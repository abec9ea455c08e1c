//! Init wizard: interactive first-run setup with cliclack styled prompts.

use std::path::Path;

use gavel_core::config::shellexpand;

/// Run the interactive setup and write the config file.
pub fn run(config_path: &str) -> anyhow::Result<()> {
    cliclack::intro(console::style("gavel init").bold().to_string())?;

    if Path::new(config_path).exists() {
        cliclack::log::warning(format!(
            "{config_path} already exists, skipping.\nDelete it and run `gavel init` again to regenerate."
        ))?;
        cliclack::outro("Nothing to do")?;
        return Ok(());
    }

    // 1. Data directory.
    let data_dir: String = cliclack::input("Data directory")
        .default_input("~/.gavel")
        .interact()?;
    let expanded = shellexpand(&data_dir);
    if !Path::new(&expanded).exists() {
        std::fs::create_dir_all(&expanded)?;
        cliclack::log::success(format!("{data_dir} created"))?;
    } else {
        cliclack::log::success(format!("{data_dir} exists"))?;
    }

    // 2. Discord credentials.
    let bot_token: String = cliclack::input("Discord bot token")
        .placeholder("Paste the token from the Discord developer portal")
        .validate(|input: &String| {
            if input.trim().is_empty() {
                return Err("Token is required");
            }
            Ok(())
        })
        .interact()?;

    let guild_id: String = cliclack::input("Guild (server) id")
        .placeholder("Enable developer mode, right-click your server, Copy Server ID")
        .validate(|input: &String| {
            if input.trim().is_empty() {
                return Err("Guild id is required");
            }
            if !input.trim().chars().all(|c| c.is_ascii_digit()) {
                return Err("Guild id is numeric");
            }
            Ok(())
        })
        .interact()?;

    // 3. Club roles.
    let club_name: String = cliclack::input("Club name")
        .default_input("the club")
        .interact()?;

    let maintainer: String = cliclack::input("Maintainer user id (receives error reports)")
        .placeholder("Your Discord user id (or Enter to skip)")
        .required(false)
        .default_input("")
        .interact()?;

    let admins: String = cliclack::input("Admin user ids")
        .placeholder("Comma-separated (or Enter to skip)")
        .required(false)
        .default_input("")
        .interact()?;

    let server_admins: String = cliclack::input("Server admin user ids")
        .placeholder("Comma-separated (or Enter to skip)")
        .required(false)
        .default_input("")
        .interact()?;

    // 4. Write config.
    let config = generate_config(
        &data_dir,
        bot_token.trim(),
        guild_id.trim(),
        &club_name,
        &parse_ids(&admins),
        &parse_ids(&server_admins),
        maintainer.trim(),
    );
    std::fs::write(config_path, config)?;
    cliclack::log::success(format!("Generated {config_path}"))?;

    cliclack::note(
        "Next steps",
        "1. Review the generated config\n\
         2. Run: gavel start\n\
         3. Send your bot a DM on Discord",
    )?;
    cliclack::outro("Setup complete")?;
    Ok(())
}

/// Split a comma-separated id list, dropping blanks.
fn parse_ids(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn toml_ids(ids: &[String]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("\"{id}\"")).collect();
    format!("[{}]", quoted.join(", "))
}

/// Generate config file content from wizard inputs (pure function for
/// testability).
pub fn generate_config(
    data_dir: &str,
    bot_token: &str,
    guild_id: &str,
    club_name: &str,
    admins: &[String],
    server_admins: &[String],
    maintainer: &str,
) -> String {
    format!(
        r#"[gavel]
name = "Gavel"
data_dir = "{data_dir}"
log_level = "info"

[discord]
bot_token = "{bot_token}"
guild_id = "{guild_id}"

[club]
name = "{club_name}"
admins = {admins}
server_admins = {server_admins}
maintainer = "{maintainer}"
feedback_channel = "feedback"
announcements_channel = "announcements"
welcome_channel = "new-members-welcome"
conversation_timeout_secs = 1800

[store]
db_path = "{data_dir}/club.db"

[shell]
timeout_secs = 15
extended_timeout_secs = 120
restart_command = "systemctl restart gavel"
"#,
        admins = toml_ids(admins),
        server_admins = toml_ids(server_admins),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_config_full() {
        let config = generate_config(
            "~/.gavel",
            "token-abc",
            "42",
            "CPU",
            &["100".to_string(), "200".to_string()],
            &["300".to_string()],
            "300",
        );
        assert!(config.contains("bot_token = \"token-abc\""));
        assert!(config.contains("guild_id = \"42\""));
        assert!(config.contains("name = \"CPU\""));
        assert!(config.contains("admins = [\"100\", \"200\"]"));
        assert!(config.contains("server_admins = [\"300\"]"));
        assert!(config.contains("maintainer = \"300\""));
        assert!(config.contains("db_path = \"~/.gavel/club.db\""));
    }

    #[test]
    fn test_generate_config_minimal() {
        let config = generate_config("~/.gavel", "tok", "1", "the club", &[], &[], "");
        assert!(config.contains("admins = []"));
        assert!(config.contains("server_admins = []"));
        assert!(config.contains("maintainer = \"\""));
    }

    #[test]
    fn test_generated_config_parses() {
        let config = generate_config(
            "~/.gavel",
            "tok",
            "1",
            "CPU",
            &["100".to_string()],
            &[],
            "100",
        );
        let parsed: gavel_core::config::Config = toml::from_str(&config).unwrap();
        assert_eq!(parsed.club.name, "CPU");
        assert_eq!(parsed.club.admins, vec!["100"]);
        assert_eq!(parsed.discord.guild_id, "1");
        assert_eq!(parsed.club.conversation_timeout_secs, 1800);
    }

    #[test]
    fn test_parse_ids_drops_blanks() {
        assert_eq!(
            parse_ids("100, 200 ,,300"),
            vec!["100".to_string(), "200".to_string(), "300".to_string()]
        );
        assert!(parse_ids("").is_empty());
        assert!(parse_ids(" , ").is_empty());
    }
}
