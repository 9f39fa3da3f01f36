//! Initialize a new Hookwire project

use anyhow::Result;
use hookwire_core::config::CONFIG_FILE;
use std::fs;
use std::path::Path;

/// Run the init command
pub async fn run(path: &str, name: Option<&str>) -> Result<()> {
    let project_dir = Path::new(path);

    // Create directory if it doesn't exist
    if !project_dir.exists() {
        fs::create_dir_all(project_dir)?;
    }

    let abs_path = project_dir.canonicalize()?;

    // Derive project name from directory name if not provided
    let project_name = match name {
        Some(n) => n.to_string(),
        None => abs_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow::anyhow!("Could not determine project name from path"))?,
    };

    if project_dir.join(CONFIG_FILE).exists() {
        anyhow::bail!(
            "Directory '{}' already contains a {}",
            project_dir.display(),
            CONFIG_FILE
        );
    }

    tracing::info!("Creating new Hookwire project: {}", project_name);

    fs::create_dir_all(project_dir.join("producers"))?;
    fs::create_dir_all(project_dir.join("consumers"))?;
    fs::create_dir_all(project_dir.join("payloads"))?;

    let config = format!(
        r#"# Hookwire Project Configuration
name: {project_name}
version: "0.1.0"

server:
  bind: "127.0.0.1:3000"

# memory (default) or postgres
store:
  kind: memory
  # url: postgres://localhost/hookwire

logs:
  capacity: 100

delivery:
  timeout_secs: 10
"#
    );
    fs::write(project_dir.join(CONFIG_FILE), config)?;

    let producer = r#"# Example producer: the payload shape a source system sends
id: user-signups
name: User Signups
description: Sent by the auth service when an account is created
attributes:
  - key: userId
    type: int
  - key: email
    type: string
  - key: profile
    type: object
  - key: tags
    type: array
    defaultValue: []
"#;
    fs::write(project_dir.join("producers/user_signups.yaml"), producer)?;

    let consumer = r#"# Example consumer: how a downstream system wants the payload
id: crm-sync
producerId: user-signups
name: CRM Sync
webhookUrl: https://crm.example.com/webhooks/contacts
attributes:
  - key: externalId
    type: int
    mappingType: direct
    producerAttributeKey: userId
  - key: source
    type: string
    mappingType: hardcoded
    value: signup
  - key: displayName
    type: string
    mappingType: expression
    expression: "${profile.firstName} + ' ' + ${profile.lastName}"
  - key: tagCount
    type: int
    mappingType: expression
    expression: "${tags}.length"
"#;
    fs::write(project_dir.join("consumers/crm_sync.yaml"), consumer)?;

    let payload = r#"{
  "userId": 42,
  "email": "ada@example.com",
  "profile": {"firstName": "Ada", "lastName": "Lovelace"},
  "tags": ["beta"]
}
"#;
    fs::write(project_dir.join("payloads/user_signup.json"), payload)?;

    let gitignore = r#"# IDE
.idea/
.vscode/
*.swp
"#;
    fs::write(project_dir.join(".gitignore"), gitignore)?;

    tracing::info!(
        "✓ Created project '{}' at {}",
        project_name,
        abs_path.display()
    );
    tracing::info!("");
    tracing::info!("Next steps:");
    if path != "." {
        tracing::info!("  cd {}", project_dir.display());
    }
    tracing::info!("  hookwire validate    # Check definitions");
    tracing::info!(
        "  hookwire transform -p producers/user_signups.yaml -k consumers/crm_sync.yaml -d payloads/user_signup.json"
    );
    tracing::info!("  hookwire serve       # Start the API");

    Ok(())
}
