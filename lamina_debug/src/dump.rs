// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON dumps of the surface tree.
//!
//! [`surface_tree`] nests a [`SurfacePlan`] by attachment, one object per
//! surface with its layer, role, geometry and pending damage. Children keep
//! plan order, so siblings read back to front.

use std::collections::HashMap;
use std::io::{self, Write};

use kurbo::Rect;
use serde_json::{Value, json};

use lamina_core::compositing::SurfaceHandle;
use lamina_render::{DamageRegion, PlanItem, SurfaceDamage, SurfacePlan};

/// Builds the surface tree as a JSON array of root surfaces.
#[must_use]
pub fn surface_tree(plan: &SurfacePlan, damage: &[SurfaceDamage]) -> Value {
    let damage: HashMap<SurfaceHandle, &DamageRegion> =
        damage.iter().map(|d| (d.handle, &d.region)).collect();
    let mut children: HashMap<Option<SurfaceHandle>, Vec<&PlanItem>> = HashMap::new();
    for item in &plan.items {
        let parent = item.parent.filter(|&p| plan.find(p).is_some());
        children.entry(parent).or_default().push(item);
    }
    Value::Array(nest(None, &children, &damage))
}

fn nest(
    parent: Option<SurfaceHandle>,
    children: &HashMap<Option<SurfaceHandle>, Vec<&PlanItem>>,
    damage: &HashMap<SurfaceHandle, &DamageRegion>,
) -> Vec<Value> {
    children
        .get(&parent)
        .map(|items| {
            items
                .iter()
                .map(|item| {
                    let mut node = item_json(item, damage.get(&item.handle).copied());
                    let kids = nest(Some(item.handle), children, damage);
                    if !kids.is_empty() {
                        node["children"] = Value::Array(kids);
                    }
                    node
                })
                .collect()
        })
        .unwrap_or_default()
}

fn item_json(item: &PlanItem, damage: Option<&DamageRegion>) -> Value {
    let mut node = json!({
        "surface": item.handle.0,
        "layer": item.layer.index(),
        "role": item.role.name(),
        "position": [item.position.x, item.position.y],
        "origin": [item.origin.x, item.origin.y],
        "size": [item.size.width, item.size.height],
    });
    if item.draws_content {
        node["drawsContent"] = Value::Bool(true);
        node["phases"] = json!(format!("{:?}", item.phases));
    }
    if item.masks_to_bounds {
        node["masksToBounds"] = Value::Bool(true);
    }
    if let Some(t) = item.transform {
        node["transform"] = json!(t.cols);
    }
    if let Some(content) = item.content {
        node["content"] = json!(format!("{:?}", content.kind));
    }
    match damage {
        Some(DamageRegion::Full) => node["damage"] = json!("full"),
        Some(DamageRegion::Rects(rects)) => {
            node["damage"] = Value::Array(rects.iter().map(rect_json).collect());
        }
        Some(DamageRegion::None) | None => {}
    }
    node
}

fn rect_json(r: &Rect) -> Value {
    json!([r.x0, r.y0, r.width(), r.height()])
}

/// Writes the surface tree as pretty-printed JSON.
pub fn write_surface_tree(
    plan: &SurfacePlan,
    damage: &[SurfaceDamage],
    writer: &mut dyn Write,
) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, &surface_tree(plan, damage))?;
    writeln!(writer)
}
