use std::collections::BTreeMap;

use crate::ids::{IdAllocator, ModelRef, VisualHandle};
use crate::math::Mat4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelUsage {
    Creature,
    Equipment,
    Placeable,
    Projectile,
}

/// Scene-graph operations consumed by the runtime. All calls are treated as
/// atomic; handles are opaque and never own the node.
pub trait SceneGraph {
    fn attach_visual(&mut self, model: &ModelRef, usage: ModelUsage) -> VisualHandle;

    /// Returns false when the handle is unknown.
    fn detach_visual(&mut self, handle: VisualHandle) -> bool;

    fn world_transform(&self, handle: VisualHandle) -> Option<Mat4>;

    fn set_local_transform(&mut self, handle: VisualHandle, transform: Mat4);

    /// World-space transform of a named anchor (model node) on `handle`.
    fn find_named_anchor(&self, handle: VisualHandle, name: &str) -> Option<Mat4>;

    /// Child visual attached to `handle` at the named attachment point.
    fn find_attachment(&self, handle: VisualHandle, name: &str) -> Option<VisualHandle>;

    fn signal_event(&mut self, handle: VisualHandle, event: &str);
}

#[derive(Debug, Clone)]
pub struct VisualNode {
    pub handle: VisualHandle,
    pub model: ModelRef,
    pub usage: ModelUsage,
    pub local_transform: Mat4,
    pub parent: Option<(VisualHandle, String)>,
    anchors: Vec<(String, Mat4)>,
    signaled_events: Vec<String>,
}

impl VisualNode {
    pub fn signaled_events(&self) -> &[String] {
        &self.signaled_events
    }

    pub fn has_anchor(&self, name: &str) -> bool {
        self.anchors.iter().any(|(anchor, _)| anchor == name)
    }
}

/// Arena of visual nodes addressed by handle. Children are detached together
/// with their parent.
#[derive(Debug, Default)]
pub struct SceneArena {
    allocator: IdAllocator,
    nodes: BTreeMap<VisualHandle, VisualNode>,
}

impl SceneArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_child(
        &mut self,
        parent: VisualHandle,
        attachment: &str,
        model: &ModelRef,
        usage: ModelUsage,
    ) -> Option<VisualHandle> {
        if !self.nodes.contains_key(&parent) {
            return None;
        }
        let handle = self.attach_visual(model, usage);
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.parent = Some((parent, attachment.to_string()));
        }
        Some(handle)
    }

    /// Declares a named anchor in the node's local space.
    pub fn set_anchor(&mut self, handle: VisualHandle, name: &str, local: Mat4) -> bool {
        let Some(node) = self.nodes.get_mut(&handle) else {
            return false;
        };
        match node.anchors.iter_mut().find(|(anchor, _)| anchor == name) {
            Some(existing) => existing.1 = local,
            None => node.anchors.push((name.to_string(), local)),
        }
        true
    }

    pub fn node(&self, handle: VisualHandle) -> Option<&VisualNode> {
        self.nodes.get(&handle)
    }

    pub fn contains(&self, handle: VisualHandle) -> bool {
        self.nodes.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn count_usage(&self, usage: ModelUsage) -> usize {
        self.nodes.values().filter(|node| node.usage == usage).count()
    }

    fn children_of(&self, parent: VisualHandle) -> Vec<VisualHandle> {
        self.nodes
            .values()
            .filter(|node| matches!(&node.parent, Some((owner, _)) if *owner == parent))
            .map(|node| node.handle)
            .collect()
    }
}

impl SceneGraph for SceneArena {
    fn attach_visual(&mut self, model: &ModelRef, usage: ModelUsage) -> VisualHandle {
        let handle = VisualHandle(self.allocator.allocate());
        self.nodes.insert(
            handle,
            VisualNode {
                handle,
                model: model.clone(),
                usage,
                local_transform: Mat4::IDENTITY,
                parent: None,
                anchors: Vec::new(),
                signaled_events: Vec::new(),
            },
        );
        handle
    }

    fn detach_visual(&mut self, handle: VisualHandle) -> bool {
        if self.nodes.remove(&handle).is_none() {
            return false;
        }
        let mut pending = self.children_of(handle);
        while let Some(child) = pending.pop() {
            if self.nodes.remove(&child).is_some() {
                pending.extend(self.children_of(child));
            }
        }
        true
    }

    fn world_transform(&self, handle: VisualHandle) -> Option<Mat4> {
        let node = self.nodes.get(&handle)?;
        match &node.parent {
            Some((parent, _)) => {
                let parent_world = self.world_transform(*parent)?;
                Some(parent_world * node.local_transform)
            }
            None => Some(node.local_transform),
        }
    }

    fn set_local_transform(&mut self, handle: VisualHandle, transform: Mat4) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.local_transform = transform;
        }
    }

    fn find_named_anchor(&self, handle: VisualHandle, name: &str) -> Option<Mat4> {
        let node = self.nodes.get(&handle)?;
        let local = node
            .anchors
            .iter()
            .find(|(anchor, _)| anchor == name)
            .map(|(_, transform)| *transform)?;
        Some(self.world_transform(handle)? * local)
    }

    fn find_attachment(&self, handle: VisualHandle, name: &str) -> Option<VisualHandle> {
        self.nodes
            .values()
            .find(|node| {
                matches!(&node.parent, Some((owner, attachment)) if *owner == handle && attachment == name)
            })
            .map(|node| node.handle)
    }

    fn signal_event(&mut self, handle: VisualHandle, event: &str) {
        if let Some(node) = self.nodes.get_mut(&handle) {
            node.signaled_events.push(event.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    fn model(name: &str) -> ModelRef {
        ModelRef(name.to_string())
    }

    #[test]
    fn child_world_transform_composes_parent() {
        let mut arena = SceneArena::new();
        let body = arena.attach_visual(&model("c_soldier"), ModelUsage::Creature);
        arena.set_local_transform(body, Mat4::from_translation(Vec3::new(2.0, 3.0, 0.0)));
        let blaster = arena
            .attach_child(body, "rhand", &model("w_blaster"), ModelUsage::Equipment)
            .expect("weapon attached");
        arena.set_local_transform(blaster, Mat4::from_translation(Vec3::new(0.5, 0.0, 1.0)));

        let world = arena.world_transform(blaster).expect("weapon transform");
        assert_eq!(world.translation(), Vec3::new(2.5, 3.0, 1.0));
        assert_eq!(arena.find_attachment(body, "rhand"), Some(blaster));
        assert_eq!(arena.find_attachment(body, "lhand"), None);
    }

    #[test]
    fn anchor_lookup_returns_world_space() {
        let mut arena = SceneArena::new();
        let target = arena.attach_visual(&model("c_droid"), ModelUsage::Creature);
        arena.set_local_transform(target, Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        arena.set_anchor(target, "impact", Mat4::from_translation(Vec3::new(0.0, 0.0, 1.2)));

        let impact = arena.find_named_anchor(target, "impact").expect("anchor");
        assert_eq!(impact.translation(), Vec3::new(10.0, 0.0, 1.2));
        assert!(arena.find_named_anchor(target, "head").is_none());
    }

    #[test]
    fn detaching_parent_removes_children() {
        let mut arena = SceneArena::new();
        let body = arena.attach_visual(&model("c_soldier"), ModelUsage::Creature);
        let weapon = arena
            .attach_child(body, "rhand", &model("w_blaster"), ModelUsage::Equipment)
            .expect("weapon");

        assert!(arena.detach_visual(body));
        assert!(!arena.contains(weapon));
        assert!(arena.is_empty());
        assert!(!arena.detach_visual(body));
    }

    #[test]
    fn signals_are_recorded_per_node() {
        let mut arena = SceneArena::new();
        let bolt = arena.attach_visual(&model("bolt"), ModelUsage::Projectile);
        arena.signal_event(bolt, "detonate");
        assert_eq!(
            arena.node(bolt).expect("bolt").signaled_events(),
            &["detonate".to_string()]
        );
        assert_eq!(arena.count_usage(ModelUsage::Projectile), 1);
    }
}
