//! Streaming construction of a minimal DAWG.
use crate::bit_vector::BitVector;
use crate::errors::{DartError, Result};
use crate::unit::DawgUnit;
use crate::utils;
use crate::MAX_VALUE;

use std::cmp::Ordering;

const INITIAL_TABLE_SIZE: usize = 1 << 10;

// Units store ids shifted left by two bits.
const MAX_NUM_UNITS: usize = 1 << 30;

#[derive(Default, Clone, Copy)]
struct DawgNode {
    // First child, or the value of a terminal node.
    child: u32,
    sibling: u32,
    label: u8,
    is_state: bool,
    has_sibling: bool,
}

impl DawgNode {
    #[inline(always)]
    fn unit(&self) -> DawgUnit {
        let has_sibling = u32::from(self.has_sibling);
        if self.label == 0 {
            DawgUnit::from_raw((self.child << 1) | has_sibling)
        } else {
            let is_state = u32::from(self.is_state);
            DawgUnit::from_raw((self.child << 2) | (is_state << 1) | has_sibling)
        }
    }
}

/// Builder of a minimal DAWG from sorted keys.
///
/// Only the nodes on the path of the last inserted key are kept as nodes. When a
/// branch is left behind, its sibling chains are hashed and either merged into an
/// equivalent chain already emitted as units or emitted as new units.
pub struct DawgBuilder {
    nodes: Vec<DawgNode>,
    units: Vec<DawgUnit>,
    labels: Vec<u8>,
    is_intersections: BitVector,
    table: Vec<u32>,
    node_stack: Vec<u32>,
    recycle_bin: Vec<u32>,
    num_states: usize,
    num_keys: usize,
}

impl DawgBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            nodes: vec![],
            units: vec![],
            labels: vec![],
            is_intersections: BitVector::new(),
            table: vec![0; INITIAL_TABLE_SIZE],
            node_stack: vec![],
            recycle_bin: vec![],
            num_states: 1,
            num_keys: 0,
        };
        let root = builder.append_node();
        builder.is_intersections.append();
        builder.units.push(DawgUnit::default());
        builder.labels.push(0);
        builder.nodes[root as usize].label = 0xFF;
        builder.node_stack.push(root);
        builder
    }

    /// Inserts a key greater than any key inserted so far.
    pub fn insert(&mut self, key: &[u8], value: u32) -> Result<()> {
        let index = self.num_keys;
        if value > MAX_VALUE {
            return Err(DartError::input_at(
                "values must be no greater than 0x7fffffff.",
                index,
                key,
            ));
        }
        if key.is_empty() {
            return Err(DartError::input_at("keys must not be empty.", index, key));
        }
        if key.contains(&0) {
            return Err(DartError::input_at(
                "keys must not contain NUL bytes.",
                index,
                key,
            ));
        }

        let mut id = 0;
        let mut key_pos = 0;
        while key_pos <= key.len() {
            let child_id = self.nodes[id as usize].child;
            if child_id == 0 {
                break;
            }
            let key_label = key.get(key_pos).copied().unwrap_or(0);
            let unit_label = self.nodes[child_id as usize].label;
            match key_label.cmp(&unit_label) {
                Ordering::Less => {
                    return Err(DartError::input_at("keys must be sorted.", index, key));
                }
                Ordering::Greater => {
                    self.nodes[child_id as usize].has_sibling = true;
                    self.flush(child_id)?;
                    break;
                }
                Ordering::Equal => {}
            }
            id = child_id;
            key_pos += 1;
        }
        if key_pos > key.len() {
            return Err(DartError::input_at(
                "keys must not be duplicated.",
                index,
                key,
            ));
        }

        for key_pos in key_pos..=key.len() {
            let key_label = key.get(key_pos).copied().unwrap_or(0);
            let child_id = self.append_node();
            let sibling = self.nodes[id as usize].child;
            let child = &mut self.nodes[child_id as usize];
            child.is_state = sibling == 0;
            child.sibling = sibling;
            child.label = key_label;
            self.nodes[id as usize].child = child_id;
            self.node_stack.push(child_id);
            id = child_id;
        }
        self.nodes[id as usize].child = value;
        self.num_keys += 1;
        Ok(())
    }

    /// Merges the remaining branch and releases the resulting DAWG.
    pub fn finish(mut self) -> Result<Dawg> {
        self.flush(0)?;
        self.units[0] = self.nodes[0].unit();
        self.labels[0] = self.nodes[0].label;
        self.is_intersections.build();

        tracing::debug!(
            num_keys = self.num_keys,
            num_states = self.num_states,
            num_units = self.units.len(),
            num_intersections = self.is_intersections.num_ones(),
            "DAWG finished"
        );

        let DawgBuilder {
            units,
            labels,
            is_intersections,
            ..
        } = self;
        Ok(Dawg {
            units,
            labels,
            is_intersections,
        })
    }

    fn flush(&mut self, id: u32) -> Result<()> {
        while let Some(&node_id) = self.node_stack.last() {
            if node_id == id {
                break;
            }
            self.node_stack.pop();

            if self.num_states >= self.table.len() - (self.table.len() >> 2) {
                self.expand_table();
            }

            let mut num_siblings = 0;
            let mut i = node_id;
            while i != 0 {
                num_siblings += 1;
                i = self.nodes[i as usize].sibling;
            }

            let (mut match_id, hash_id) = self.find_node(node_id);
            if match_id != 0 {
                self.is_intersections.set(match_id as usize, true);
            } else {
                let mut unit_id = 0;
                for _ in 0..num_siblings {
                    unit_id = self.append_unit()?;
                }
                let mut i = node_id;
                while i != 0 {
                    let node = self.nodes[i as usize];
                    self.units[unit_id as usize] = node.unit();
                    self.labels[unit_id as usize] = node.label;
                    unit_id -= 1;
                    i = node.sibling;
                }
                match_id = unit_id + 1;
                self.table[hash_id] = match_id;
                self.num_states += 1;
            }

            let mut i = node_id;
            while i != 0 {
                let next = self.nodes[i as usize].sibling;
                self.free_node(i);
                i = next;
            }

            let parent_id = *self.node_stack.last().unwrap_or(&0);
            self.nodes[parent_id as usize].child = match_id;
        }
        self.node_stack.pop();
        Ok(())
    }

    fn expand_table(&mut self) {
        let table_size = self.table.len() << 1;
        self.table.clear();
        self.table.resize(table_size, 0);

        for id in 1..self.units.len() {
            if self.labels[id] == 0 || self.units[id].is_state() {
                let hash_id = self.find_unit(id as u32);
                self.table[hash_id] = id as u32;
            }
        }
    }

    /// Finds the vacant slot for an emitted chain, which is never in the table yet.
    fn find_unit(&self, id: u32) -> usize {
        let mut hash_id = self.hash_unit(id) as usize % self.table.len();
        while self.table[hash_id] != 0 {
            hash_id = (hash_id + 1) % self.table.len();
        }
        hash_id
    }

    /// Finds an emitted chain equal to the chain of `node_id`, returning 0 and the
    /// vacant slot if none.
    fn find_node(&self, node_id: u32) -> (u32, usize) {
        let mut hash_id = self.hash_node(node_id) as usize % self.table.len();
        loop {
            let unit_id = self.table[hash_id];
            if unit_id == 0 {
                return (0, hash_id);
            }
            if self.are_equal(node_id, unit_id) {
                return (unit_id, hash_id);
            }
            hash_id = (hash_id + 1) % self.table.len();
        }
    }

    fn are_equal(&self, node_id: u32, mut unit_id: u32) -> bool {
        let mut i = self.nodes[node_id as usize].sibling;
        while i != 0 {
            if !self.units[unit_id as usize].has_sibling() {
                return false;
            }
            unit_id += 1;
            i = self.nodes[i as usize].sibling;
        }
        if self.units[unit_id as usize].has_sibling() {
            return false;
        }

        let mut i = node_id;
        while i != 0 {
            let node = &self.nodes[i as usize];
            if node.unit() != self.units[unit_id as usize] || node.label != self.labels[unit_id as usize]
            {
                return false;
            }
            i = node.sibling;
            unit_id = unit_id.wrapping_sub(1);
        }
        true
    }

    fn hash_unit(&self, mut id: u32) -> u32 {
        let mut hash_value = 0;
        while id != 0 {
            let unit = self.units[id as usize];
            let label = u32::from(self.labels[id as usize]);
            hash_value ^= utils::hash_u32((label << 24) ^ unit.raw());
            if !unit.has_sibling() {
                break;
            }
            id += 1;
        }
        hash_value
    }

    fn hash_node(&self, mut id: u32) -> u32 {
        let mut hash_value = 0;
        while id != 0 {
            let node = &self.nodes[id as usize];
            let label = u32::from(node.label);
            hash_value ^= utils::hash_u32((label << 24) ^ node.unit().raw());
            id = node.sibling;
        }
        hash_value
    }

    fn append_unit(&mut self) -> Result<u32> {
        if self.units.len() >= MAX_NUM_UNITS {
            return Err(DartError::scale("number of DAWG units", MAX_NUM_UNITS as u32));
        }
        self.is_intersections.append();
        self.units.push(DawgUnit::default());
        self.labels.push(0);
        Ok(self.units.len() as u32 - 1)
    }

    fn append_node(&mut self) -> u32 {
        if let Some(id) = self.recycle_bin.pop() {
            self.nodes[id as usize] = DawgNode::default();
            id
        } else {
            self.nodes.push(DawgNode::default());
            self.nodes.len() as u32 - 1
        }
    }

    #[inline(always)]
    fn free_node(&mut self, id: u32) {
        self.recycle_bin.push(id);
    }
}

/// Minimal DAWG released by [`DawgBuilder::finish`].
///
/// Children of a state are consecutive units ordered by label, and unit 0 is the
/// root.
pub struct Dawg {
    units: Vec<DawgUnit>,
    labels: Vec<u8>,
    is_intersections: BitVector,
}

impl Dawg {
    #[inline(always)]
    pub const fn root(&self) -> u32 {
        0
    }

    #[inline(always)]
    pub fn child(&self, id: u32) -> u32 {
        self.units[id as usize].child()
    }

    #[inline(always)]
    pub fn sibling(&self, id: u32) -> u32 {
        if self.units[id as usize].has_sibling() {
            id + 1
        } else {
            0
        }
    }

    #[inline(always)]
    pub fn value(&self, id: u32) -> u32 {
        self.units[id as usize].value()
    }

    #[inline(always)]
    pub fn is_leaf(&self, id: u32) -> bool {
        self.label(id) == 0
    }

    #[inline(always)]
    pub fn label(&self, id: u32) -> u8 {
        self.labels[id as usize]
    }

    #[inline(always)]
    pub fn is_intersection(&self, id: u32) -> bool {
        self.is_intersections.get(id as usize)
    }

    #[inline(always)]
    pub fn intersection_id(&self, id: u32) -> u32 {
        self.is_intersections.rank(id as usize) - 1
    }

    #[inline(always)]
    pub const fn num_intersections(&self) -> u32 {
        self.is_intersections.num_ones()
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.units.len()
    }
}
