//! Members sharing one layout id. Exactly one member leads; the others
//! follow it visually.

use std::rc::Rc;

use hashbrown::HashMap;
use log::debug;

use crate::node::{NodeId, ProjectionNode};

pub(crate) type Nodes = HashMap<NodeId, ProjectionNode>;

#[derive(Clone, Debug, Default)]
pub struct NodeStack {
    members: Vec<NodeId>,
    lead: Option<NodeId>,
    prev_lead: Option<NodeId>,
}

impl NodeStack {
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn lead(&self) -> Option<NodeId> {
        self.lead
    }

    pub fn prev_lead(&self) -> Option<NodeId> {
        self.prev_lead
    }

    pub(crate) fn add(&mut self, nodes: &mut Nodes, id: NodeId) {
        if !self.members.contains(&id) {
            self.members.push(id);
        }
        if let Some(node) = nodes.get_mut(&id) {
            node.schedule_render();
        }
    }

    /// Remove `id`. A removed lead hands over to the newest remaining member
    /// but stays recorded as lead when none remain, so a later member can
    /// still resume from it.
    pub(crate) fn remove(&mut self, nodes: &mut Nodes, id: NodeId) {
        self.members.retain(|m| *m != id);
        if self.prev_lead == Some(id) {
            self.prev_lead = None;
        }
        if self.lead == Some(id) {
            if let Some(&next) = self.members.last() {
                self.promote(nodes, next, false);
            }
        }
    }

    /// Hand the lead back to the newest present member before `id`.
    pub(crate) fn relegate(&mut self, nodes: &mut Nodes, id: NodeId) -> bool {
        let Some(index) = self.members.iter().position(|m| *m == id) else {
            return false;
        };
        if index == 0 {
            return false;
        }
        let prev = self.members[..=index]
            .iter()
            .rev()
            .copied()
            .find(|m| nodes.get(m).map_or(false, |n| n.options.is_present));
        match prev {
            Some(prev) => {
                self.promote(nodes, prev, false);
                true
            }
            None => false,
        }
    }

    /// Make `id` the lead. It resumes from the previous lead, inheriting its
    /// snapshot together with the values it was rendering.
    pub(crate) fn promote(&mut self, nodes: &mut Nodes, id: NodeId, preserve_follow_opacity: bool) {
        let prev = self.lead;
        if prev == Some(id) {
            return;
        }
        self.prev_lead = prev;
        self.lead = Some(id);
        debug!("promoting {id:?} over {prev:?}");

        let handover = prev.and_then(|p| nodes.get_mut(&p)).map(|prev_node| {
            prev_node.schedule_render();
            if preserve_follow_opacity {
                prev_node.preserve_opacity = true;
            }
            let snapshot = prev_node.snapshot.clone().map(|mut s| {
                s.latest_values = prev_node
                    .animation_values
                    .clone()
                    .unwrap_or_else(|| prev_node.latest_values.clone());
                s
            });
            (prev_node.id, snapshot)
        });

        let Some(node) = nodes.get_mut(&id) else { return };
        node.is_visible = true;
        let Some((prev_id, snapshot)) = handover else {
            return;
        };
        node.schedule_render();
        node.resume_from = Some(prev_id);
        if snapshot.is_some() {
            node.snapshot = snapshot;
        }
        let hide_follower = node.options.crossfade == Some(false);
        if hide_follower {
            if let Some(prev_node) = nodes.get_mut(&prev_id) {
                prev_node.hide_at_midpoint = true;
            }
        }
    }

    /// Exit callbacks of every member and of whatever each resumes from.
    pub(crate) fn exit_animation_complete(&self, nodes: &Nodes) -> Vec<Rc<dyn Fn()>> {
        let mut callbacks = Vec::new();
        for node in self.members.iter().filter_map(|m| nodes.get(m)) {
            callbacks.extend(node.options.on_exit_complete.clone());
            if let Some(resuming) = node.resuming_from.and_then(|r| nodes.get(&r)) {
                callbacks.extend(resuming.options.on_exit_complete.clone());
            }
        }
        callbacks
    }

    pub(crate) fn schedule_render(&self, nodes: &mut Nodes) {
        for member in &self.members {
            if let Some(node) = nodes.get_mut(member).filter(|n| n.is_mounted()) {
                node.schedule_render();
            }
        }
    }

    pub(crate) fn remove_lead_snapshot(&self, nodes: &mut Nodes) {
        if let Some(lead) = self.lead.and_then(|l| nodes.get_mut(&l)) {
            lead.snapshot = None;
        }
    }

    /// Forget `id` entirely, once nothing can resume from it.
    pub(crate) fn forget(&mut self, id: NodeId) {
        self.members.retain(|m| *m != id);
        if self.lead == Some(id) {
            self.lead = self.members.last().copied();
        }
        if self.prev_lead == Some(id) {
            self.prev_lead = None;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.lead.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Measurements, NodeOptions};
    use kinema_api_core::{LayoutBox, Value, ValueMap};

    fn nodes(count: u64) -> Nodes {
        (0..count)
            .map(|i| {
                let mut n = ProjectionNode::new(NodeId(i), None, 0, ValueMap::new());
                n.options = NodeOptions::shared("card");
                (NodeId(i), n)
            })
            .collect()
    }

    fn snapshot(source: NodeId) -> Measurements {
        let b = LayoutBox::from_edges(0.0, 0.0, 10.0, 10.0);
        Measurements {
            animation_id: 1,
            measured_box: b,
            layout_box: b,
            latest_values: ValueMap::new(),
            source,
        }
    }

    #[test]
    fn promotion_hands_over_snapshot_and_values() {
        let mut nodes = nodes(2);
        let mut stack = NodeStack::default();
        stack.add(&mut nodes, NodeId(0));
        stack.promote(&mut nodes, NodeId(0), false);
        {
            let a = nodes.get_mut(&NodeId(0)).unwrap();
            a.snapshot = Some(snapshot(NodeId(0)));
            a.latest_values.insert("opacity".into(), Value::Number(0.4));
        }
        stack.add(&mut nodes, NodeId(1));
        stack.promote(&mut nodes, NodeId(1), true);

        assert_eq!(stack.lead(), Some(NodeId(1)));
        assert_eq!(stack.prev_lead(), Some(NodeId(0)));
        let b = &nodes[&NodeId(1)];
        assert_eq!(b.resume_from, Some(NodeId(0)));
        let inherited = b.snapshot.as_ref().unwrap();
        assert_eq!(inherited.source, NodeId(0));
        assert_eq!(inherited.latest_values["opacity"], Value::Number(0.4));
        assert!(nodes[&NodeId(0)].preserve_opacity);
    }

    #[test]
    fn removing_last_lead_keeps_it_recorded() {
        let mut nodes = nodes(2);
        let mut stack = NodeStack::default();
        stack.add(&mut nodes, NodeId(0));
        stack.promote(&mut nodes, NodeId(0), false);
        stack.remove(&mut nodes, NodeId(0));
        assert!(stack.members().is_empty());
        assert_eq!(stack.lead(), Some(NodeId(0)));

        stack.add(&mut nodes, NodeId(1));
        stack.promote(&mut nodes, NodeId(1), false);
        assert_eq!(nodes[&NodeId(1)].resume_from, Some(NodeId(0)));
        stack.forget(NodeId(0));
        assert_eq!(stack.prev_lead(), None);
    }

    #[test]
    fn relegate_skips_exiting_members() {
        let mut nodes = nodes(3);
        let mut stack = NodeStack::default();
        for i in 0..3 {
            stack.add(&mut nodes, NodeId(i));
            stack.promote(&mut nodes, NodeId(i), false);
        }
        nodes.get_mut(&NodeId(1)).unwrap().options.is_present = false;
        assert!(stack.relegate(&mut nodes, NodeId(2)));
        assert_eq!(stack.lead(), Some(NodeId(2)));

        assert!(stack.relegate(&mut nodes, NodeId(1)));
        assert_eq!(stack.lead(), Some(NodeId(0)));
        assert!(!stack.relegate(&mut nodes, NodeId(0)));
    }

    #[test]
    fn disabled_crossfade_marks_follower() {
        let mut nodes = nodes(2);
        nodes.get_mut(&NodeId(1)).unwrap().options.crossfade = Some(false);
        let mut stack = NodeStack::default();
        stack.add(&mut nodes, NodeId(0));
        stack.promote(&mut nodes, NodeId(0), false);
        stack.add(&mut nodes, NodeId(1));
        stack.promote(&mut nodes, NodeId(1), false);
        assert!(nodes[&NodeId(0)].hide_at_midpoint);
    }
}
