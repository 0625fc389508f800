use std::path::Path;

use anyhow::Context;
use edgeplane_control::NewBlueprint;
use edgeplane_rules::BlueprintView;
use serde_json::json;
use uuid::Uuid;

use super::{App, print_json};

/// Submit a Blueprint document (YAML with `blueprint`, `name`, `version`,
/// `yaml`, and optionally `uuid` and `description`).
pub async fn add(app: &App, file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let request: NewBlueprint = serde_yaml::from_str(&text)?;
    let blueprint = app.inventory.add_blueprint(request).await?;
    println!("✓ Blueprint {} ({} {}) created", blueprint.uuid, blueprint.name, blueprint.version);
    Ok(())
}

pub fn list(app: &App) -> anyhow::Result<()> {
    for bp in app.store.list_blueprints()? {
        println!("{}  {}  {}", bp.uuid, bp.name, bp.version);
    }
    Ok(())
}

/// The stored Blueprint plus what it inherits.
pub fn show(app: &App, uuid: Uuid) -> anyhow::Result<()> {
    let blueprint = app
        .store
        .get_blueprint(&uuid)?
        .with_context(|| format!("no blueprint {uuid}"))?;
    let view = BlueprintView::new(blueprint.clone(), &app.store);
    let lineage: Vec<Uuid> = view.lineage()?.iter().map(|bp| bp.uuid).collect();
    print_json(&json!({
        "blueprint": blueprint,
        "lineage": lineage,
        "workflows": view.workflow_names()?,
    }))
}

pub fn describe(app: &App, uuid: Uuid, description: &str) -> anyhow::Result<()> {
    app.inventory.update_blueprint_description(uuid, description)?;
    println!("✓ Blueprint {uuid} updated");
    Ok(())
}
