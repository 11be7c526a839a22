use std::collections::HashMap;
use std::path::{Path, PathBuf};

use renderdoc_bridge_core::types::{ResourceId, ResourceRef};

use crate::replay::{
    ActionNode, BufferDescription, ReplayController, ResourceDescription, ResourceKind,
    TextureDescription,
};

/// Where a node sits in the tree: child indices from the roots, its parent
/// event and its nesting depth.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NodeLocation {
    path: Vec<usize>,
    parent: Option<u32>,
    depth: usize,
}

/// The one loaded capture. Owned by the facade and dropped through
/// [`CaptureSession::close`], which shuts the controller down.
pub struct CaptureSession {
    path: PathBuf,
    filename: String,
    api: String,
    roots: Vec<ActionNode>,
    index: HashMap<u32, NodeLocation>,
    resources: HashMap<ResourceId, ResourceDescription>,
    textures: HashMap<ResourceId, TextureDescription>,
    buffers: HashMap<ResourceId, BufferDescription>,
    controller: Box<dyn ReplayController>,
}

impl CaptureSession {
    /// Builds the session around a freshly opened controller.
    ///
    /// On error the controller is handed back so the caller can shut it down.
    pub fn new(
        path: &Path,
        controller: Box<dyn ReplayController>,
    ) -> Result<Self, (String, Box<dyn ReplayController>)> {
        let roots = controller.root_actions();
        let index = match build_index(&roots) {
            Ok(index) => index,
            Err(message) => return Err((message, controller)),
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let resources = controller
            .resources()
            .into_iter()
            .map(|r| (r.resource_id, r))
            .collect();
        let textures = controller
            .textures()
            .into_iter()
            .map(|t| (t.resource_id, t))
            .collect();
        let buffers = controller
            .buffers()
            .into_iter()
            .map(|b| (b.resource_id, b))
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            filename,
            api: controller.api_name(),
            roots,
            index,
            resources,
            textures,
            buffers,
            controller,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    pub fn total_events(&self) -> usize {
        self.index.len()
    }

    pub fn roots(&self) -> &[ActionNode] {
        &self.roots
    }

    pub fn contains(&self, event_id: u32) -> bool {
        self.index.contains_key(&event_id)
    }

    pub fn action(&self, event_id: u32) -> Option<&ActionNode> {
        let location = self.index.get(&event_id)?;
        let (first, rest) = location.path.split_first()?;
        let mut node = self.roots.get(*first)?;
        for &i in rest {
            node = node.children.get(i)?;
        }
        Some(node)
    }

    pub fn parent_of(&self, event_id: u32) -> Option<u32> {
        self.index.get(&event_id)?.parent
    }

    pub fn depth_of(&self, event_id: u32) -> Option<usize> {
        self.index.get(&event_id).map(|l| l.depth)
    }

    /// Ancestors of `event_id`, outermost first.
    pub fn ancestors(&self, event_id: u32) -> Vec<&ActionNode> {
        let mut chain = Vec::new();
        let mut current = self.parent_of(event_id);
        while let Some(id) = current {
            if let Some(node) = self.action(id) {
                chain.push(node);
            }
            current = self.parent_of(id);
        }
        chain.reverse();
        chain
    }

    /// Every node in pre-order.
    pub fn preorder(&self) -> Vec<&ActionNode> {
        let mut out = Vec::with_capacity(self.index.len());
        let mut stack: Vec<&ActionNode> = self.roots.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    pub fn resource_name(&self, id: ResourceId) -> Option<String> {
        self.resources.get(&id).and_then(|r| r.name.clone())
    }

    pub fn resource_ref(&self, id: ResourceId) -> ResourceRef {
        ResourceRef::new(id, self.resource_name(id))
    }

    pub fn resource_kind(&self, id: ResourceId) -> ResourceKind {
        if self.textures.contains_key(&id) {
            return ResourceKind::Texture;
        }
        if self.buffers.contains_key(&id) {
            return ResourceKind::Buffer;
        }
        self.resources
            .get(&id)
            .map(|r| r.kind)
            .unwrap_or(ResourceKind::Other)
    }

    pub fn texture(&self, id: ResourceId) -> Option<&TextureDescription> {
        self.textures.get(&id)
    }

    pub fn buffer(&self, id: ResourceId) -> Option<&BufferDescription> {
        self.buffers.get(&id)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn controller(&self) -> &dyn ReplayController {
        self.controller.as_ref()
    }

    pub fn controller_mut(&mut self) -> &mut dyn ReplayController {
        self.controller.as_mut()
    }

    pub fn close(self) {
        tracing::info!("Closing capture {}", self.path.display());
        self.controller.shutdown();
    }
}

/// Indexes every node and checks that event ids strictly increase in
/// pre-order.
fn build_index(roots: &[ActionNode]) -> Result<HashMap<u32, NodeLocation>, String> {
    let mut index = HashMap::new();
    let mut last: Option<u32> = None;
    let mut stack: Vec<(&ActionNode, Vec<usize>, Option<u32>)> = roots
        .iter()
        .enumerate()
        .rev()
        .map(|(i, node)| (node, vec![i], None))
        .collect();

    while let Some((node, path, parent)) = stack.pop() {
        if let Some(previous) = last {
            if node.event_id <= previous {
                return Err(format!(
                    "event ids must strictly increase in order: {} follows {}",
                    node.event_id, previous
                ));
            }
        }
        last = Some(node.event_id);

        for (i, child) in node.children.iter().enumerate().rev() {
            let mut child_path = path.clone();
            child_path.push(i);
            stack.push((child, child_path, Some(node.event_id)));
        }

        let depth = path.len() - 1;
        index.insert(
            node.event_id,
            NodeLocation {
                path,
                parent,
                depth,
            },
        );
    }

    Ok(index)
}
