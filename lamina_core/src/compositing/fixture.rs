// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared setup for the compositing tests.

use kurbo::{Point, Rect, Size};

use crate::box_tree::{BoxGeometry, BoxId, BoxStyle, BoxTree, LayoutBox, PositionScheme};
use crate::compositing::{
    CompositingAssigner, CompositingOutput, CompositorSettings, PrecomputedAssignment, SurfacePool,
    SurfaceRole,
};
use crate::layer::{PaintLayerId, PaintLayerTree};
use crate::lifecycle::CompositingQuery;
use crate::trace::Tracer;

pub(crate) const Q: CompositingQuery<'static> = CompositingQuery::known_safe();

pub(crate) struct Fixture {
    pub(crate) boxes: BoxTree,
    pub(crate) tree: PaintLayerTree,
    pub(crate) pool: SurfacePool,
    pub(crate) settings: CompositorSettings,
    pub(crate) table: PrecomputedAssignment,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self {
            boxes: BoxTree::new(Size::new(800.0, 600.0)),
            tree: PaintLayerTree::new(),
            pool: SurfacePool::new(None),
            settings: CompositorSettings::new(),
            table: PrecomputedAssignment::new(),
        }
    }

    pub(crate) fn positioned(
        &mut self,
        parent: BoxId,
        scheme: PositionScheme,
        at: (f64, f64),
        size: f64,
    ) -> BoxId {
        self.styled(
            parent,
            BoxStyle {
                position: scheme,
                ..BoxStyle::default()
            },
            at,
            size,
        )
    }

    pub(crate) fn styled(&mut self, parent: BoxId, style: BoxStyle, at: (f64, f64), size: f64) -> BoxId {
        let b = LayoutBox::block()
            .with_style(style)
            .with_geometry(BoxGeometry::new(Point::new(at.0, at.1), Size::new(size, size)));
        self.boxes.append(parent, b)
    }

    pub(crate) fn update(&mut self) -> CompositingOutput {
        self.tree
            .sync_with_box_tree(&mut self.boxes, &self.settings, &mut self.pool);
        let root = self.tree.root().unwrap();
        self.tree.update_layer_positions_after_layout(&self.boxes, root);
        self.tree.update_descendant_dependent_flags(&self.boxes, root);
        self.tree.update_all_z_order_lists();
        let decisions = self.table.assign(&self.tree, &self.boxes);
        self.tree.update_compositing(
            &self.boxes,
            &self.settings,
            &decisions,
            &mut self.pool,
            &mut Tracer::none(),
        )
    }

    pub(crate) fn layer(&self, b: BoxId) -> PaintLayerId {
        self.boxes.get(b).layer().unwrap()
    }

    pub(crate) fn surface(&self, b: BoxId, role: SurfaceRole) -> Rect {
        let m = self.tree.mapping(self.layer(b), Q).unwrap();
        m.surface(role).unwrap().frame()
    }

    pub(crate) fn has_surface(&self, b: BoxId, role: SurfaceRole) -> bool {
        self.tree
            .mapping(self.layer(b), Q)
            .is_some_and(|m| m.has(role))
    }
}
