use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Identifier of a node on an advancing front.
    pub struct NodeId;
    /// Identifier of a closed front polygon.
    pub struct FrontId;
}

/// A front node: one occurrence of a mesh vertex on a front polygon.
///
/// The same vertex may occur on several fronts after a split.
#[derive(Debug, Clone, Copy)]
pub struct Node {
    /// Index of the mesh vertex.
    pub vertex: u32,
    /// Previous node on the polygon.
    pub prev: NodeId,
    /// Next node on the polygon.
    pub next: NodeId,
    /// Polygon the node belongs to.
    pub front: FrontId,
    /// Cached opening angle, `NaN` when stale.
    pub angle: f64,
}

/// A closed front polygon.
///
/// Every directed edge `node -> node.next` belongs to exactly one emitted
/// triangle; the unmeshed region lies to its right when viewed from outside.
#[derive(Debug, Clone, Copy)]
pub struct Front {
    /// Any node of the polygon.
    pub head: NodeId,
    /// Number of nodes.
    pub len: usize,
}

/// Arena owning all front nodes and polygons of one marching run.
#[derive(Debug, Default)]
pub struct FrontStore {
    nodes: SlotMap<NodeId, Node>,
    fronts: SlotMap<FrontId, Front>,
}

impl FrontStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a closed polygon through `vertices` in order.
    pub fn add_front(&mut self, vertices: &[u32]) -> FrontId {
        let front = self.fronts.insert(Front {
            head: NodeId::default(),
            len: vertices.len(),
        });
        let ids: Vec<NodeId> = vertices
            .iter()
            .map(|&vertex| {
                self.nodes.insert(Node {
                    vertex,
                    prev: NodeId::default(),
                    next: NodeId::default(),
                    front,
                    angle: f64::NAN,
                })
            })
            .collect();
        let n = ids.len();
        for (i, &id) in ids.iter().enumerate() {
            let node = &mut self.nodes[id];
            node.prev = ids[(i + n - 1) % n];
            node.next = ids[(i + 1) % n];
        }
        if let Some(&head) = ids.first() {
            self.fronts[front].head = head;
        }
        front
    }

    /// Returns the node data.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Returns the polygon data.
    #[must_use]
    pub fn front(&self, id: FrontId) -> &Front {
        &self.fronts[id]
    }

    /// Returns `true` if `id` names a live front.
    #[must_use]
    pub fn has_front(&self, id: FrontId) -> bool {
        self.fronts.contains_key(id)
    }

    /// Number of live fronts.
    #[must_use]
    pub fn front_count(&self) -> usize {
        self.fronts.len()
    }

    /// Identifiers of all live fronts.
    pub fn front_ids(&self) -> impl Iterator<Item = FrontId> + '_ {
        self.fronts.keys()
    }

    /// Identifiers of all live nodes.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys()
    }

    /// Walks a polygon starting at its head.
    #[must_use]
    pub fn walk(&self, front: FrontId) -> Vec<NodeId> {
        let Front { head, len } = self.fronts[front];
        let mut out = Vec::with_capacity(len);
        let mut id = head;
        for _ in 0..len {
            out.push(id);
            id = self.nodes[id].next;
        }
        out
    }

    /// Stores the cached opening angle of a node.
    pub fn set_angle(&mut self, id: NodeId, angle: f64) {
        self.nodes[id].angle = angle;
    }

    fn invalidate(&mut self, id: NodeId) {
        self.nodes[id].angle = f64::NAN;
    }

    /// Removes a node, joining its neighbours.
    pub fn remove_node(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        self.nodes[node.prev].next = node.next;
        self.nodes[node.next].prev = node.prev;
        self.invalidate(node.prev);
        self.invalidate(node.next);
        let front = &mut self.fronts[node.front];
        front.len -= 1;
        if front.head == id {
            front.head = node.next;
        }
    }

    /// Inserts a new node for `vertex` between `after` and its successor.
    pub fn insert_after(&mut self, after: NodeId, vertex: u32) -> NodeId {
        let Node { next, front, .. } = self.nodes[after];
        let id = self.nodes.insert(Node {
            vertex,
            prev: after,
            next,
            front,
            angle: f64::NAN,
        });
        self.nodes[after].next = id;
        self.nodes[next].prev = id;
        self.invalidate(after);
        self.invalidate(next);
        self.fronts[front].len += 1;
        id
    }

    /// Removes a whole polygon and its nodes.
    pub fn remove_front(&mut self, front: FrontId) {
        for id in self.walk(front) {
            self.nodes.remove(id);
        }
        self.fronts.remove(front);
    }

    /// Splits the polygon containing `a` and `b` along the bridge `a - b`.
    ///
    /// `a` keeps the part `a -> ... -> b` closed by `b -> a`; a new polygon
    /// receives `b -> ... -> a` closed by `a -> b`. Returns the new polygon.
    pub fn split(&mut self, a: NodeId, b: NodeId) -> FrontId {
        let a_node = self.nodes[a];
        let b_node = self.nodes[b];
        let old_front = a_node.front;

        let new_front = self.fronts.insert(Front { head: b, len: 0 });
        let b_copy = self.nodes.insert(Node {
            vertex: b_node.vertex,
            prev: NodeId::default(),
            next: b_node.next,
            front: new_front,
            angle: f64::NAN,
        });
        let a_copy = self.nodes.insert(Node {
            vertex: a_node.vertex,
            prev: a_node.prev,
            next: b_copy,
            front: new_front,
            angle: f64::NAN,
        });
        self.nodes[b_copy].prev = a_copy;
        self.nodes[b_node.next].prev = b_copy;
        self.nodes[a_node.prev].next = a_copy;

        self.nodes[b].next = a;
        self.nodes[a].prev = b;
        self.invalidate(a);
        self.invalidate(b);
        self.invalidate(b_node.next);
        self.invalidate(a_node.prev);

        self.fronts[new_front].head = b_copy;
        let new_len = self.relabel(b_copy, new_front);
        self.fronts[new_front].len = new_len;
        self.fronts[old_front].head = a;
        self.fronts[old_front].len = self.count_from(a);
        new_front
    }

    /// Merges the polygon of `b` into the polygon of `a` along the bridge `a - b`.
    ///
    /// The merged cycle is `a -> b -> ... -> b -> a -> ...`, visiting both
    /// endpoints twice. The polygon of `b` is removed.
    pub fn merge(&mut self, a: NodeId, b: NodeId) {
        let a_node = self.nodes[a];
        let b_node = self.nodes[b];
        let target = a_node.front;
        let absorbed = b_node.front;

        let b_copy = self.nodes.insert(Node {
            vertex: b_node.vertex,
            prev: b_node.prev,
            next: NodeId::default(),
            front: target,
            angle: f64::NAN,
        });
        let a_copy = self.nodes.insert(Node {
            vertex: a_node.vertex,
            prev: b_copy,
            next: a_node.next,
            front: target,
            angle: f64::NAN,
        });
        self.nodes[b_copy].next = a_copy;
        self.nodes[b_node.prev].next = b_copy;
        self.nodes[a_node.next].prev = a_copy;
        self.nodes[a].next = b;
        self.nodes[b].prev = a;
        self.invalidate(a);
        self.invalidate(b);
        self.invalidate(a_node.next);
        self.invalidate(b_node.prev);

        self.fronts.remove(absorbed);
        let len = self.relabel(a, target);
        self.fronts[target].head = a;
        self.fronts[target].len = len;
    }

    /// Assigns every node reachable from `start` to `front`, returning the count.
    fn relabel(&mut self, start: NodeId, front: FrontId) -> usize {
        let mut id = start;
        let mut count = 0;
        loop {
            self.nodes[id].front = front;
            count += 1;
            id = self.nodes[id].next;
            if id == start {
                return count;
            }
        }
    }

    fn count_from(&self, start: NodeId) -> usize {
        let mut id = start;
        let mut count = 0;
        loop {
            count += 1;
            id = self.nodes[id].next;
            if id == start {
                return count;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertices(store: &FrontStore, front: FrontId) -> Vec<u32> {
        store
            .walk(front)
            .into_iter()
            .map(|id| store.node(id).vertex)
            .collect()
    }

    fn rotate_to(mut v: Vec<u32>, first: u32) -> Vec<u32> {
        let pos = v.iter().position(|&x| x == first).unwrap_or(0);
        v.rotate_left(pos);
        v
    }

    #[test]
    fn add_and_walk() {
        let mut store = FrontStore::new();
        let f = store.add_front(&[0, 1, 2, 3]);
        assert_eq!(vertices(&store, f), vec![0, 1, 2, 3]);
        assert_eq!(store.front(f).len, 4);
    }

    #[test]
    fn remove_and_insert() {
        let mut store = FrontStore::new();
        let f = store.add_front(&[0, 1, 2, 3]);
        let ids = store.walk(f);
        store.remove_node(ids[1]);
        assert_eq!(rotate_to(vertices(&store, f), 0), vec![0, 2, 3]);
        store.insert_after(ids[0], 9);
        assert_eq!(rotate_to(vertices(&store, f), 0), vec![0, 9, 2, 3]);
        assert_eq!(store.front(f).len, 4);
    }

    #[test]
    fn removing_head_moves_head() {
        let mut store = FrontStore::new();
        let f = store.add_front(&[0, 1, 2]);
        let head = store.front(f).head;
        store.remove_node(head);
        assert_eq!(vertices(&store, f), vec![1, 2]);
    }

    #[test]
    fn split_shares_bridge_in_both_directions() {
        let mut store = FrontStore::new();
        let f = store.add_front(&[0, 1, 2, 3, 4, 5]);
        let ids = store.walk(f);
        let g = store.split(ids[0], ids[3]);
        assert_eq!(rotate_to(vertices(&store, f), 0), vec![0, 1, 2, 3]);
        assert_eq!(rotate_to(vertices(&store, g), 3), vec![3, 4, 5, 0]);
        assert_eq!(store.front(f).len + store.front(g).len, 8);
        assert_eq!(store.front_count(), 2);
    }

    #[test]
    fn merge_visits_bridge_endpoints_twice() {
        let mut store = FrontStore::new();
        let f = store.add_front(&[0, 1, 2]);
        let g = store.add_front(&[10, 11, 12]);
        let a = store.walk(f)[0];
        let b = store.walk(g)[0];
        store.merge(a, b);
        assert_eq!(store.front_count(), 1);
        assert_eq!(vertices(&store, f), vec![0, 10, 11, 12, 10, 0, 1, 2]);
        assert_eq!(store.front(f).len, 8);
        assert!(store.node_ids().all(|id| store.node(id).front == f));
    }

    #[test]
    fn remove_front_drops_nodes() {
        let mut store = FrontStore::new();
        let f = store.add_front(&[0, 1, 2]);
        store.remove_front(f);
        assert_eq!(store.front_count(), 0);
        assert_eq!(store.node_ids().count(), 0);
    }
}
