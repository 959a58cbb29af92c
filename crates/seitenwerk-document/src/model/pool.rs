// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-addressed resource pool.
//
// Fonts, images, form XObjects, graphics states and content streams are
// interned here once. Every entry is keyed by a canonical SHA-256 over its
// structure, with references folded in as the hash of their target, so two
// byte-identical resources imported from different files share one id.
// Entries only ever refer to entries interned before them, which keeps the
// pool acyclic.

use std::collections::{BTreeSet, HashMap};

use lopdf::{Dictionary, Object, Stream};
use seitenwerk_security::hash_bytes;

use crate::pdf::objects;

/// Handle to an entry in a [`ResourcePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

impl ResourceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The id as a reference object, the form used inside pooled objects.
    pub fn reference(self) -> Object {
        Object::Reference((self.0, 0))
    }

    pub(crate) fn from_reference(obj: &Object) -> Option<Self> {
        match obj {
            Object::Reference((num, _)) => Some(Self(*num)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    object: Object,
    hash: String,
}

/// Append-only, deduplicating store of shared PDF objects.
#[derive(Debug, Clone, Default)]
pub struct ResourcePool {
    entries: Vec<Entry>,
    by_hash: HashMap<String, ResourceId>,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store `object`, returning the id of an identical entry if one exists.
    ///
    /// References inside `object` must already point at entries of this pool.
    pub fn intern(&mut self, object: Object) -> ResourceId {
        let hash = self.content_hash(&object);
        if let Some(&id) = self.by_hash.get(&hash) {
            return id;
        }
        let id = ResourceId(self.entries.len() as u32);
        self.by_hash.insert(hash.clone(), id);
        self.entries.push(Entry { object, hash });
        id
    }

    pub fn get(&self, id: ResourceId) -> Option<&Object> {
        self.entries.get(id.index()).map(|e| &e.object)
    }

    /// Canonical content hash of an entry.
    pub fn hash(&self, id: ResourceId) -> Option<&str> {
        self.entries.get(id.index()).map(|e| e.hash.as_str())
    }

    /// Follow references until a direct object. Dangling references resolve to null.
    pub fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        let mut current = object;
        for _ in 0..objects::MAX_TREE_DEPTH {
            if !matches!(current, Object::Reference(_)) {
                return current;
            }
            match ResourceId::from_reference(current).and_then(|id| self.get(id)) {
                Some(next) => current = next,
                None => return &objects::NULL,
            }
        }
        &objects::NULL
    }

    /// Dictionary behind `object`, looking through references and stream dicts.
    pub fn dict<'a>(&'a self, object: &'a Object) -> Option<&'a Dictionary> {
        match self.resolve(object) {
            Object::Dictionary(dict) => Some(dict),
            Object::Stream(stream) => Some(&stream.dict),
            _ => None,
        }
    }

    pub fn dict_by_id(&self, id: ResourceId) -> Option<&Dictionary> {
        self.get(id).and_then(|obj| self.dict(obj))
    }

    /// Look up `key` in `dict` and resolve the value.
    pub fn lookup<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        dict.get(key).ok().map(|obj| self.resolve(obj))
    }

    pub fn stream(&self, id: ResourceId) -> Option<&Stream> {
        match self.get(id) {
            Some(Object::Stream(stream)) => Some(stream),
            _ => None,
        }
    }

    /// Decoded payload of a stream entry.
    pub fn stream_data(&self, id: ResourceId) -> Option<Vec<u8>> {
        self.stream(id).map(objects::decode_stream)
    }

    /// Copy entry `id` of `other`, and everything it references, into this pool.
    ///
    /// `memo` maps ids of `other` to ids of `self` and should be shared across
    /// calls that import from the same source so common resources are walked once.
    pub fn import(
        &mut self,
        other: &ResourcePool,
        id: ResourceId,
        memo: &mut HashMap<ResourceId, ResourceId>,
    ) -> Option<ResourceId> {
        if let Some(&mapped) = memo.get(&id) {
            return Some(mapped);
        }
        let object = other.get(id)?;
        let remapped = self.import_object(other, object, memo);
        let new_id = self.intern(remapped);
        memo.insert(id, new_id);
        Some(new_id)
    }

    fn import_object(
        &mut self,
        other: &ResourcePool,
        object: &Object,
        memo: &mut HashMap<ResourceId, ResourceId>,
    ) -> Object {
        match object {
            Object::Reference(_) => ResourceId::from_reference(object)
                .and_then(|id| self.import(other, id, memo))
                .map_or(Object::Null, ResourceId::reference),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.import_object(other, item, memo))
                    .collect(),
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.import_dict(other, dict, memo)),
            Object::Stream(stream) => {
                let dict = self.import_dict(other, &stream.dict, memo);
                Object::Stream(Stream::new(dict, stream.content.clone()))
            }
            plain => plain.clone(),
        }
    }

    fn import_dict(
        &mut self,
        other: &ResourcePool,
        dict: &Dictionary,
        memo: &mut HashMap<ResourceId, ResourceId>,
    ) -> Dictionary {
        let mut out = Dictionary::new();
        for (key, value) in dict.iter() {
            out.set(key.clone(), self.import_object(other, value, memo));
        }
        out
    }

    /// Every id reachable from `roots`, in ascending order.
    pub fn reachable(&self, roots: impl IntoIterator<Item = ResourceId>) -> Vec<ResourceId> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<ResourceId> = roots.into_iter().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(object) = self.get(id) {
                collect_references(object, &mut stack);
            }
        }
        seen.into_iter().collect()
    }

    fn content_hash(&self, object: &Object) -> String {
        let mut buf = Vec::with_capacity(256);
        self.canonical(object, &mut buf);
        hash_bytes(&buf)
    }

    fn canonical(&self, object: &Object, out: &mut Vec<u8>) {
        match object {
            Object::Null => out.push(b'n'),
            Object::Boolean(b) => {
                out.push(b'b');
                out.push(u8::from(*b));
            }
            Object::Integer(i) => push_tagged(out, b'i', i.to_string().as_bytes()),
            Object::Real(r) => {
                let v = *r as f64;
                if v.fract() == 0.0 && v.abs() < 1.0e15 {
                    push_tagged(out, b'i', (v as i64).to_string().as_bytes());
                } else {
                    push_tagged(out, b'r', format!("{v:.6}").as_bytes());
                }
            }
            Object::Name(name) => push_tagged(out, b'/', name),
            Object::String(bytes, _) => push_tagged(out, b's', bytes),
            Object::Array(items) => {
                out.push(b'[');
                out.extend((items.len() as u64).to_le_bytes());
                for item in items {
                    self.canonical(item, out);
                }
                out.push(b']');
            }
            Object::Dictionary(dict) => self.canonical_dict(dict, &[], out),
            Object::Stream(stream) => {
                out.push(b'S');
                self.canonical_dict(&stream.dict, &[b"Length"], out);
                push_tagged(out, b'd', &stream.content);
            }
            Object::Reference(_) => {
                let target = ResourceId::from_reference(object).and_then(|id| self.hash(id));
                push_tagged(out, b'R', target.unwrap_or("?").as_bytes());
            }
        }
    }

    fn canonical_dict(&self, dict: &Dictionary, skip: &[&[u8]], out: &mut Vec<u8>) {
        let mut entries: Vec<(&Vec<u8>, &Object)> = dict
            .iter()
            .filter(|(key, _)| !skip.contains(&key.as_slice()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        out.push(b'<');
        out.extend((entries.len() as u64).to_le_bytes());
        for (key, value) in entries {
            push_tagged(out, b'k', key);
            self.canonical(value, out);
        }
        out.push(b'>');
    }
}

fn push_tagged(out: &mut Vec<u8>, tag: u8, bytes: &[u8]) {
    out.push(tag);
    out.extend((bytes.len() as u64).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn collect_references(object: &Object, into: &mut Vec<ResourceId>) {
    match object {
        Object::Reference(_) => into.extend(ResourceId::from_reference(object)),
        Object::Array(items) => items.iter().for_each(|item| collect_references(item, into)),
        Object::Dictionary(dict) => dict.iter().for_each(|(_, v)| collect_references(v, into)),
        Object::Stream(stream) => stream
            .dict
            .iter()
            .for_each(|(_, v)| collect_references(v, into)),
        _ => {}
    }
}
