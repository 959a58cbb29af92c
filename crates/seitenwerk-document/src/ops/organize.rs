// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page organisation: reorder, rotate and delete.
//
// Every operation validates all of its parameters before touching the
// document and returns a new `Document`; the input is never modified.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use seitenwerk_core::Rotation;
use seitenwerk_core::error::{Result, SeitenwerkError};
use tracing::{debug, instrument};

use crate::model::Document;

/// Check that `permutation` is a bijection onto `0..page_count`.
fn check_permutation(permutation: &[usize], page_count: usize) -> Result<()> {
    if permutation.len() != page_count {
        return Err(SeitenwerkError::InvalidPermutation(format!(
            "expected {page_count} entries, got {}",
            permutation.len()
        )));
    }
    let mut seen = vec![false; page_count];
    for &index in permutation {
        match seen.get_mut(index) {
            None => {
                return Err(SeitenwerkError::InvalidPermutation(format!(
                    "index {index} is out of range for {page_count} pages"
                )));
            }
            Some(true) => {
                return Err(SeitenwerkError::InvalidPermutation(format!(
                    "index {index} appears more than once"
                )));
            }
            Some(slot) => *slot = true,
        }
    }
    Ok(())
}

/// Output page `i` is input page `permutation[i]`.
#[instrument(skip_all, fields(pages = document.page_count()))]
pub fn reorder(document: &Document, permutation: &[usize]) -> Result<Document> {
    check_permutation(permutation, document.page_count())?;
    let mut out = document.clone();
    let reordered = permutation
        .iter()
        .map(|&index| document.pages()[index].clone())
        .collect();
    *out.pages_mut() = reordered;
    Ok(out)
}

/// The permutation that undoes `permutation` under [`reorder`].
pub fn inverse_permutation(permutation: &[usize]) -> Result<Vec<usize>> {
    check_permutation(permutation, permutation.len())?;
    let mut inverse = vec![0; permutation.len()];
    for (position, &index) in permutation.iter().enumerate() {
        inverse[index] = position;
    }
    Ok(inverse)
}

/// Apply `(page_index, delta_degrees)` edits. Deltas must be multiples of
/// 90 and accumulate modulo 360; several edits may target the same page.
#[instrument(skip_all, fields(pages = document.page_count(), edits = edits.len()))]
pub fn rotate(document: &Document, edits: &[(usize, i32)]) -> Result<Document> {
    let mut rotations: Vec<Rotation> = document.pages().iter().map(|p| p.rotation()).collect();
    for &(index, delta) in edits {
        let current = rotations
            .get_mut(index)
            .ok_or(SeitenwerkError::PageOutOfRange {
                index,
                page_count: document.page_count(),
            })?;
        *current = current.rotated_by(delta)?;
    }
    let mut out = document.clone();
    for (page, rotation) in out.pages_mut().iter_mut().zip(rotations) {
        page.set_rotation(rotation);
    }
    Ok(out)
}

/// Remove the given pages. Duplicate indices count once; an out-of-range
/// index is an error; removing every page is refused.
#[instrument(skip_all, fields(pages = document.page_count(), requested = indices.len()))]
pub fn delete(document: &Document, indices: &[usize]) -> Result<Document> {
    let page_count = document.page_count();
    let doomed: BTreeSet<usize> = indices.iter().copied().collect();
    if doomed.len() >= page_count {
        return Err(SeitenwerkError::CannotDeleteAllPages {
            requested: doomed.len(),
            page_count,
        });
    }
    if let Some(&index) = doomed.iter().find(|&&i| i >= page_count) {
        return Err(SeitenwerkError::PageOutOfRange { index, page_count });
    }
    let keep: Vec<usize> = (0..page_count).filter(|i| !doomed.contains(i)).collect();
    debug!(kept = keep.len(), "Deleting pages");
    let mut out = document.clone();
    let pages = keep
        .iter()
        .map(|&index| document.pages()[index].clone())
        .collect();
    *out.pages_mut() = pages;
    Ok(out)
}

/// Edits from an organise view, applied as reorder, then rotate, then
/// delete. Rotation and deletion indices refer to positions after the
/// reorder step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizePlan {
    pub order: Option<Vec<usize>>,
    pub rotations: Vec<(usize, i32)>,
    pub deletions: Vec<usize>,
}

impl OrganizePlan {
    pub fn is_empty(&self) -> bool {
        self.order.is_none() && self.rotations.is_empty() && self.deletions.is_empty()
    }
}

/// Apply a whole [`OrganizePlan`]. Nothing is returned unless every step
/// succeeds.
pub fn organize(document: &Document, plan: &OrganizePlan) -> Result<Document> {
    let reordered = match &plan.order {
        Some(order) => reorder(document, order)?,
        None => document.clone(),
    };
    let rotated = if plan.rotations.is_empty() {
        reordered
    } else {
        rotate(&reordered, &plan.rotations)?
    };
    if plan.deletions.is_empty() {
        Ok(rotated)
    } else {
        delete(&rotated, &plan.deletions)
    }
}
