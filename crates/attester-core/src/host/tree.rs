//! Arena-backed, append-only test description tree.

/// Index of a node inside its [`TestTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptionId(usize);

impl DescriptionId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A named node of the test tree (suite or leaf test).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    pub id: DescriptionId,
    pub name: String,
    pub parent: Option<DescriptionId>,
    pub children: Vec<DescriptionId>,
}

impl Description {
    /// A node without children is reported as an individual test.
    pub fn is_test(&self) -> bool {
        self.children.is_empty() && self.parent.is_some()
    }

    pub fn is_suite(&self) -> bool {
        !self.is_test()
    }
}

/// The test tree. Node `0` is always the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTree {
    nodes: Vec<Description>,
}

impl TestTree {
    /// Create a tree holding only a root suite.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![Description {
                id: DescriptionId(0),
                name: root_name.into(),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> &Description {
        &self.nodes[0]
    }

    /// Append a new node under `parent` and return its id.
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not belong to this tree.
    pub fn add_child(&mut self, parent: DescriptionId, name: impl Into<String>) -> DescriptionId {
        assert!(parent.0 < self.nodes.len(), "parent {parent:?} not in tree");
        let id = DescriptionId(self.nodes.len());
        self.nodes.push(Description {
            id,
            name: name.into(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn get(&self, id: DescriptionId) -> Option<&Description> {
        self.nodes.get(id.0)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in creation order, which is depth-first pre-order.
    pub fn iter(&self) -> impl Iterator<Item = &Description> {
        self.nodes.iter()
    }

    pub fn children(&self, id: DescriptionId) -> impl Iterator<Item = &Description> {
        self.get(id)
            .into_iter()
            .flat_map(|d| d.children.iter().map(|c| &self.nodes[c.0]))
    }

    /// Depth of a node; the root is at depth 0.
    pub fn depth(&self, id: DescriptionId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id).and_then(|d| d.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent.0].parent;
        }
        depth
    }

    /// Names from the root down to `id`, joined with `/`.
    pub fn path(&self, id: DescriptionId) -> String {
        let mut names = Vec::new();
        let mut current = self.get(id);
        while let Some(node) = current {
            names.push(node.name.as_str());
            current = node.parent.and_then(|p| self.get(p));
        }
        names.reverse();
        names.join("/")
    }

    /// Number of leaf tests.
    pub fn test_count(&self) -> usize {
        self.nodes.iter().filter(|d| d.is_test()).count()
    }
}
