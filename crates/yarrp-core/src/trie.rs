//! A binary PATRICIA trie over `IPv4` or `IPv6` prefixes.
//!
//! Prefixes are held left aligned in a `u128` so both families share one bit layout.  Nodes live
//! in an arena and are addressed by a [`NodeId`] whose generation must match the slot it points
//! at; a handle kept after its node was removed resolves to nothing rather than to whichever node
//! later reuses the slot.
//!
//! A node carrying a payload is a registered prefix.  A node without one is glue and always has
//! two children.

use crate::error::{Error, Result};
use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// The address family of a trie.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    #[must_use]
    pub const fn max_bits(self) -> u8 {
        match self {
            Self::V4 => 32,
            Self::V6 => 128,
        }
    }

    #[must_use]
    pub const fn of(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }
}

/// A generation checked handle to a trie node.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Node<T> {
    key: u128,
    bits: u8,
    parent: Option<NodeId>,
    left: Option<NodeId>,
    right: Option<NodeId>,
    payload: Option<T>,
}

impl<T> Node<T> {
    const fn new(key: u128, bits: u8, parent: Option<NodeId>, payload: Option<T>) -> Self {
        Self {
            key,
            bits,
            parent,
            left: None,
            right: None,
            payload,
        }
    }

    const fn is_glue(&self) -> bool {
        self.payload.is_none()
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    node: Option<Node<T>>,
}

/// A longest prefix match trie.
#[derive(Debug)]
pub struct PrefixTrie<T> {
    family: Family,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    root: Option<NodeId>,
    len: usize,
}

impl<T> PrefixTrie<T> {
    #[must_use]
    pub const fn new(family: Family) -> Self {
        Self {
            family,
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
        }
    }

    #[must_use]
    pub const fn family(&self) -> Family {
        self.family
    }

    /// The number of registered prefixes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register `prefix` with `payload`.
    ///
    /// Inserting a prefix which is already registered keeps the existing payload and returns the
    /// existing node.
    pub fn insert(&mut self, prefix: IpNetwork, payload: T) -> Result<NodeId> {
        let (key, bits) = self.key_of(prefix)?;
        let max_bits = self.family.max_bits();
        let Some(root) = self.root else {
            let id = self.alloc(Node::new(key, bits, None, Some(payload)));
            self.root = Some(id);
            self.len += 1;
            return Ok(id);
        };

        // descend to the closest registered prefix
        let mut id = root;
        loop {
            let node = self.node(id);
            if node.bits >= bits && !node.is_glue() {
                break;
            }
            let next = if node.bits < max_bits && bit_set(key, node.bits) {
                node.right
            } else {
                node.left
            };
            match next {
                Some(next) => id = next,
                None => break,
            }
        }

        let node = self.node(id);
        let check_bits = node.bits.min(bits);
        let differ = first_difference(key, node.key, check_bits);

        // climb back to the node at which the new prefix diverges
        let mut parent = node.parent;
        while let Some(p) = parent {
            if self.node(p).bits < differ {
                break;
            }
            id = p;
            parent = self.node(p).parent;
        }

        let (node_bits, node_key, node_parent) = {
            let node = self.node(id);
            (node.bits, node.key, node.parent)
        };
        if differ == bits && node_bits == bits {
            let node = self.node_mut(id);
            if node.payload.is_none() {
                node.key = key;
                node.payload = Some(payload);
                self.len += 1;
            }
            return Ok(id);
        }

        self.len += 1;
        if node_bits == differ {
            // new child
            let goes_right = node_bits < max_bits && bit_set(key, node_bits);
            let new = self.alloc(Node::new(key, bits, Some(id), Some(payload)));
            let node = self.node_mut(id);
            if goes_right {
                node.right = Some(new);
            } else {
                node.left = Some(new);
            }
            return Ok(new);
        }

        if bits == differ {
            // new parent
            let new = self.alloc(Node::new(key, bits, node_parent, Some(payload)));
            if bits < max_bits && bit_set(node_key, bits) {
                self.node_mut(new).right = Some(id);
            } else {
                self.node_mut(new).left = Some(id);
            }
            self.replace_child(node_parent, id, Some(new));
            self.node_mut(id).parent = Some(new);
            return Ok(new);
        }

        // new glue
        let glue = self.alloc(Node::new(key, differ, node_parent, None));
        let new = self.alloc(Node::new(key, bits, Some(glue), Some(payload)));
        if differ < max_bits && bit_set(key, differ) {
            self.node_mut(glue).right = Some(new);
            self.node_mut(glue).left = Some(id);
        } else {
            self.node_mut(glue).right = Some(id);
            self.node_mut(glue).left = Some(new);
        }
        self.replace_child(node_parent, id, Some(glue));
        self.node_mut(id).parent = Some(glue);
        Ok(new)
    }

    /// Find the node registered for exactly `prefix`.
    #[must_use]
    pub fn lookup_exact(&self, prefix: IpNetwork) -> Option<NodeId> {
        let (key, bits) = self.key_of(prefix).ok()?;
        let mut id = self.root?;
        let max_bits = self.family.max_bits();
        while self.node(id).bits < bits {
            let node = self.node(id);
            id = if node.bits < max_bits && bit_set(key, node.bits) {
                node.right?
            } else {
                node.left?
            };
        }
        let node = self.node(id);
        (node.bits == bits && !node.is_glue() && prefix_match(node.key, key, bits)).then_some(id)
    }

    /// Find the most specific registered prefix covering `prefix`.
    ///
    /// When `inclusive` is false `prefix` itself is not a candidate.
    #[must_use]
    pub fn lookup_best(&self, prefix: IpNetwork, inclusive: bool) -> Option<NodeId> {
        let (key, bits) = self.key_of(prefix).ok()?;
        let max_bits = self.family.max_bits();
        let mut stack = Vec::with_capacity(usize::from(max_bits) + 1);
        let mut current = self.root;
        while let Some(id) = current {
            let node = self.node(id);
            if node.bits >= bits {
                break;
            }
            if !node.is_glue() {
                stack.push(id);
            }
            current = if bit_set(key, node.bits) {
                node.right
            } else {
                node.left
            };
        }
        if let Some(id) = current {
            if inclusive && !self.node(id).is_glue() {
                stack.push(id);
            }
        }
        stack.into_iter().rev().find(|&id| {
            let node = self.node(id);
            node.bits <= bits && prefix_match(node.key, key, node.bits)
        })
    }

    /// Find the most specific registered prefix covering `addr`.
    #[must_use]
    pub fn longest_match(&self, addr: IpAddr) -> Option<NodeId> {
        self.lookup_best(host_network(addr), true)
    }

    /// The payload of the prefix covering `addr`, if any.
    #[must_use]
    pub fn get(&self, addr: IpAddr) -> Option<&T> {
        self.longest_match(addr).and_then(|id| self.payload(id))
    }

    /// The payload of a node, if the handle is live and the node is not glue.
    #[must_use]
    pub fn payload(&self, id: NodeId) -> Option<&T> {
        self.slot_node(id)?.payload.as_ref()
    }

    pub fn payload_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slot_node_mut(id)?.payload.as_mut()
    }

    /// The prefix a live, non-glue node was registered with.
    #[must_use]
    pub fn prefix(&self, id: NodeId) -> Option<IpNetwork> {
        let node = self.slot_node(id)?;
        if node.is_glue() {
            return None;
        }
        Some(network_of(self.family, node.key, node.bits))
    }

    /// Unregister the prefix held by `id`, returning its payload.
    ///
    /// A node with two children only loses its payload and becomes glue.  A glue node left with a
    /// single child is collapsed into that child.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        let node = self.slot_node_mut(id)?;
        let payload = node.payload.take()?;
        let (parent, left, right) = (node.parent, node.left, node.right);
        self.len -= 1;
        match (left, right) {
            (Some(_), Some(_)) => {}
            (None, None) => {
                self.free_node(id);
                let Some(parent) = parent else {
                    self.root = None;
                    return Some(payload);
                };
                let parent_node = self.node_mut(parent);
                let sibling = if parent_node.right == Some(id) {
                    parent_node.right = None;
                    parent_node.left
                } else {
                    parent_node.left = None;
                    parent_node.right
                };
                if parent_node.is_glue() {
                    let grandparent = parent_node.parent;
                    if let Some(sibling) = sibling {
                        self.node_mut(sibling).parent = grandparent;
                    }
                    self.replace_child(grandparent, parent, sibling);
                    self.free_node(parent);
                }
            }
            (Some(child), None) | (None, Some(child)) => {
                self.node_mut(child).parent = parent;
                self.replace_child(parent, id, Some(child));
                self.free_node(id);
            }
        }
        Some(payload)
    }

    /// Iterate over every registered prefix and its payload.
    pub fn iter(&self) -> impl Iterator<Item = (IpNetwork, &T)> + '_ {
        self.slots.iter().filter_map(|slot| {
            let node = slot.node.as_ref()?;
            let payload = node.payload.as_ref()?;
            Some((network_of(self.family, node.key, node.bits), payload))
        })
    }

    fn key_of(&self, prefix: IpNetwork) -> Result<(u128, u8)> {
        match (self.family, prefix) {
            (Family::V4, IpNetwork::V4(net)) => Ok((
                u128::from(u32::from(net.network())) << 96,
                net.prefix(),
            )),
            (Family::V6, IpNetwork::V6(net)) => Ok((u128::from(net.network()), net.prefix())),
            _ => Err(Error::AddressFamily(prefix.to_string())),
        }
    }

    fn alloc(&mut self, node: Node<T>) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    fn free_node(&mut self, id: NodeId) {
        let slot = &mut self.slots[id.index as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
    }

    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(parent) => {
                let node = self.node_mut(parent);
                if node.right == Some(old) {
                    node.right = new;
                } else {
                    node.left = new;
                }
            }
        }
    }

    fn slot_node(&self, id: NodeId) -> Option<&Node<T>> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation == id.generation {
            slot.node.as_ref()
        } else {
            None
        }
    }

    fn slot_node_mut(&mut self, id: NodeId) -> Option<&mut Node<T>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation == id.generation {
            slot.node.as_mut()
        } else {
            None
        }
    }

    // Internal links always refer to live nodes.
    fn node(&self, id: NodeId) -> &Node<T> {
        match self.slots[id.index as usize].node.as_ref() {
            Some(node) => node,
            None => unreachable!("dangling trie link {id:?}"),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        match self.slots[id.index as usize].node.as_mut() {
            Some(node) => node,
            None => unreachable!("dangling trie link {id:?}"),
        }
    }
}

/// A host route for `addr`.
#[must_use]
pub fn host_network(addr: IpAddr) -> IpNetwork {
    match addr {
        IpAddr::V4(addr) => IpNetwork::V4(Ipv4Network::from(addr)),
        IpAddr::V6(addr) => IpNetwork::V6(Ipv6Network::from(addr)),
    }
}

fn network_of(family: Family, key: u128, bits: u8) -> IpNetwork {
    match family {
        Family::V4 => IpNetwork::V4(
            Ipv4Network::new(Ipv4Addr::from((key >> 96) as u32), bits)
                .unwrap_or_else(|_| Ipv4Network::from(Ipv4Addr::UNSPECIFIED)),
        ),
        Family::V6 => IpNetwork::V6(
            Ipv6Network::new(Ipv6Addr::from(key), bits)
                .unwrap_or_else(|_| Ipv6Network::from(Ipv6Addr::UNSPECIFIED)),
        ),
    }
}

const fn bit_set(key: u128, bit: u8) -> bool {
    (key >> (127 - bit as u32)) & 1 == 1
}

const fn prefix_match(a: u128, b: u128, bits: u8) -> bool {
    if bits == 0 {
        return true;
    }
    let mask = u128::MAX << (128 - bits as u32);
    (a ^ b) & mask == 0
}

fn first_difference(a: u128, b: u128, bits: u8) -> u8 {
    let differ = (a ^ b).leading_zeros() as u8;
    differ.min(bits)
}
