//! Hardware, Node, Region and Edgesite administration.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use edgeplane_control::{EdgesiteUpdate, NewEdgesite, NewHardware, NewNode, NewRegion};
use uuid::Uuid;

use super::{App, print_json, print_rows, read_document};

pub fn add_hardware(app: &App, name: &str, description: &str, file: Option<&Path>) -> anyhow::Result<()> {
    let hardware = app.inventory.add_hardware(NewHardware {
        uuid: None,
        name: name.to_string(),
        description: description.to_string(),
        yaml: read_document(file)?,
    })?;
    println!("✓ Hardware {} created", hardware.uuid);
    Ok(())
}

pub fn list_hardware(app: &App) -> anyhow::Result<()> {
    let all = app.store.list_hardware()?;
    print_rows(all.iter().map(|h| (h.uuid, h.name.as_str())));
    Ok(())
}

pub fn show_hardware(app: &App, uuid: Uuid) -> anyhow::Result<()> {
    let hardware = app
        .store
        .get_hardware(&uuid)?
        .with_context(|| format!("no hardware {uuid}"))?;
    print_json(&hardware)
}

pub fn add_node(
    app: &App,
    name: &str,
    description: &str,
    hardware: Uuid,
    file: Option<&Path>,
) -> anyhow::Result<()> {
    let node = app.inventory.add_node(NewNode {
        uuid: None,
        name: name.to_string(),
        description: description.to_string(),
        hardware,
        yaml: read_document(file)?,
    })?;
    println!("✓ Node {} created", node.uuid);
    Ok(())
}

pub fn list_nodes(app: &App) -> anyhow::Result<()> {
    let all = app.store.list_nodes()?;
    print_rows(all.iter().map(|n| (n.uuid, n.name.as_str())));
    Ok(())
}

pub fn show_node(app: &App, uuid: Uuid) -> anyhow::Result<()> {
    let node = app
        .store
        .get_node(&uuid)?
        .with_context(|| format!("no node {uuid}"))?;
    print_json(&node)
}

pub fn add_region(app: &App, name: &str, description: &str, parent: Option<Uuid>) -> anyhow::Result<()> {
    let region = app.inventory.add_region(NewRegion {
        uuid: None,
        name: name.to_string(),
        description: description.to_string(),
        parent,
    })?;
    println!("✓ Region {} created", region.uuid);
    Ok(())
}

pub fn list_regions(app: &App) -> anyhow::Result<()> {
    let all = app.store.list_regions()?;
    print_rows(all.iter().map(|r| (r.uuid, r.name.as_str())));
    Ok(())
}

pub fn show_region(app: &App, uuid: Uuid) -> anyhow::Result<()> {
    let region = app
        .store
        .get_region(&uuid)?
        .with_context(|| format!("no region {uuid}"))?;
    print_json(&region)
}

pub async fn add_edgesite(
    app: &App,
    name: &str,
    description: &str,
    nodes: Vec<Uuid>,
    regions: Vec<Uuid>,
) -> anyhow::Result<()> {
    let site = app
        .inventory
        .add_edgesite(NewEdgesite {
            uuid: None,
            name: name.to_string(),
            description: description.to_string(),
            nodes: nodes.into_iter().collect(),
            regions: regions.into_iter().collect(),
        })
        .await?;
    println!("✓ Edgesite {} created", site.uuid);
    Ok(())
}

pub async fn update_edgesite(
    app: &App,
    uuid: Uuid,
    name: Option<String>,
    description: Option<String>,
    nodes: Vec<Uuid>,
    regions: Vec<Uuid>,
) -> anyhow::Result<()> {
    let as_set = |list: Vec<Uuid>| (!list.is_empty()).then(|| list.into_iter().collect::<BTreeSet<_>>());
    let site = app
        .inventory
        .update_edgesite(
            uuid,
            EdgesiteUpdate {
                name,
                description,
                nodes: as_set(nodes),
                regions: as_set(regions),
            },
        )
        .await?;
    println!("✓ Edgesite {} updated", site.uuid);
    Ok(())
}

pub fn list_edgesites(app: &App) -> anyhow::Result<()> {
    let all = app.store.list_edgesites()?;
    print_rows(all.iter().map(|e| (e.uuid, e.name.as_str())));
    Ok(())
}

pub fn show_edgesite(app: &App, uuid: Uuid) -> anyhow::Result<()> {
    let site = app
        .store
        .get_edgesite(&uuid)?
        .with_context(|| format!("no edgesite {uuid}"))?;
    print_json(&site)
}
