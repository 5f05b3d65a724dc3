//! Sparse bipartite graph of comparisons between one target list and one
//! candidate list.
//!
//! The matrix owns both descriptor lists (plus any composites created while
//! filtering) in a [`DescriptorArena`], and stores a [`Comparison`] only for
//! pairs that were in scope and survived initialization. Columns are
//! targets, rows are candidates.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::debug;
use nalgebra::DMatrix;

use crate::comparison::{Comparison, Level};
use crate::descriptor::{DescKey, Descriptor, DescriptorArena, FileInformation};
use crate::distances::{Difference, Statistic};
use crate::evaluation::PrecisionRecall;
use crate::filter::FilterKind;
use crate::internal::sparse::SparseTable;
use crate::report::{Report, ReportKind};
use crate::scope::ScopeRules;
use crate::span::FrameSpan;
use crate::surreal::Surreal;
use crate::{Category, Result};

/// One connected component of good comparisons, as matrix indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submatrix {
    /// Target (column) indices, ascending.
    pub targets: Vec<usize>,
    /// Candidate (row) indices, ascending.
    pub candidates: Vec<usize>,
}

impl Submatrix {
    pub fn contains(&self, target: usize, candidate: usize) -> bool {
        self.targets.binary_search(&target).is_ok()
            && self.candidates.binary_search(&candidate).is_ok()
    }
}

fn is_good(comp: &Comparison, level: Level, filtered: FilterKind) -> bool {
    comp.level() >= level
        && (filtered == FilterKind::None || comp.filter_level() != FilterKind::None)
        && comp.distance() < f64::INFINITY
}

#[derive(Debug, Clone)]
pub struct CompMatrix {
    arena: DescriptorArena,
    targets: Vec<DescKey>,
    candidates: Vec<DescKey>,
    scope: Arc<ScopeRules>,
    file: FileInformation,
    table: SparseTable<Comparison>,
    level: Level,
    filtered: FilterKind,
    continuable: bool,
    initialized: bool,
    total: Surreal,
    merged_targets: BTreeSet<u32>,
    merged_candidates: BTreeSet<u32>,
}

impl CompMatrix {
    pub fn new(
        targets: Vec<Descriptor>,
        candidates: Vec<Descriptor>,
        scope: Arc<ScopeRules>,
        file: FileInformation,
    ) -> Self {
        let mut arena = DescriptorArena::new();
        let targets: Vec<DescKey> = targets.into_iter().map(|d| arena.insert(d)).collect();
        let candidates: Vec<DescKey> = candidates.into_iter().map(|d| arena.insert(d)).collect();
        let table = SparseTable::new(targets.len(), candidates.len());
        Self {
            arena,
            targets,
            candidates,
            scope,
            file,
            table,
            level: Level::Started,
            filtered: FilterKind::None,
            continuable: true,
            initialized: false,
            total: Surreal::zero(),
            merged_targets: BTreeSet::new(),
            merged_candidates: BTreeSet::new(),
        }
    }

    // ===== Accessors =====

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn filtered(&self) -> FilterKind {
        self.filtered
    }

    pub fn is_continuable(&self) -> bool {
        self.continuable
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn target(&self, index: usize) -> &Descriptor {
        &self.arena[self.targets[index]]
    }

    pub fn candidate(&self, index: usize) -> &Descriptor {
        &self.arena[self.candidates[index]]
    }

    pub fn descriptor(&self, key: DescKey) -> &Descriptor {
        &self.arena[key]
    }

    pub fn arena(&self) -> &DescriptorArena {
        &self.arena
    }

    pub fn scope(&self) -> &ScopeRules {
        &self.scope
    }

    pub fn file_information(&self) -> &FileInformation {
        &self.file
    }

    /// The running sum set by the last level promotion or filter pass.
    pub fn total(&self) -> Surreal {
        self.total
    }

    /// Ids of targets and candidates absorbed into surviving compositions.
    pub fn merged_ids(&self) -> (&BTreeSet<u32>, &BTreeSet<u32>) {
        (&self.merged_targets, &self.merged_candidates)
    }

    pub fn comparison(&self, target: usize, candidate: usize) -> Option<&Comparison> {
        self.table.get(target, candidate)
    }

    pub(crate) fn comparison_mut(&mut self, target: usize, candidate: usize) -> Option<&mut Comparison> {
        self.table.get_mut(target, candidate)
    }

    /// Whether a comparison meets the matrix level, survived any filter that
    /// ran, and has a finite distance.
    pub fn good_comp(&self, comp: &Comparison) -> bool {
        is_good(comp, self.level, self.filtered)
    }

    pub fn is_good_at(&self, target: usize, candidate: usize) -> bool {
        self.table
            .get(target, candidate)
            .map_or(false, |c| self.good_comp(c))
    }

    /// Dead since before the current level: failed more than one level ago,
    /// or failed one level ago and then was dropped by the filter.
    fn long_dead_comp(&self, comp: &Comparison) -> bool {
        let level = self.level.value();
        let comp_level = comp.level().value();
        comp_level < level - 1
            || (comp_level < level
                && self.filtered != FilterKind::None
                && comp.filter_level() == FilterKind::None)
    }

    /// Every good comparison as `(target, candidate, comparison)`.
    pub fn good_comparisons(&self) -> impl Iterator<Item = (usize, usize, &Comparison)> + '_ {
        self.table.iter().filter(move |(_, _, c)| self.good_comp(c))
    }

    pub fn good_comparison_count(&self) -> usize {
        self.good_comparisons().count()
    }

    /// Good edges inside one component, column-major.
    pub fn good_edges(&self, sub: &Submatrix) -> Vec<(usize, usize)> {
        sub.targets
            .iter()
            .flat_map(|&t| {
                self.table
                    .rows_in_column(t)
                    .filter(move |&c| sub.contains(t, c))
                    .map(move |c| (t, c))
            })
            .filter(|&(t, c)| self.is_good_at(t, c))
            .collect()
    }

    /// Good distances, +inf where there is no good comparison. Rows are
    /// targets.
    pub fn distance_table(&self) -> DMatrix<f64> {
        let mut table = DMatrix::from_element(self.targets.len(), self.candidates.len(), f64::INFINITY);
        for (t, c, comp) in self.good_comparisons() {
            table[(t, c)] = comp.distance();
        }
        table
    }

    // ===== Levels =====

    /// Build the table, keeping only in-scope pairs that reach `up_to`.
    /// Returns whether any comparison got there.
    ///
    /// # Panics
    ///
    /// If the matrix was already initialized.
    pub fn initialize(&mut self, up_to: Level) -> bool {
        assert!(!self.initialized, "comparison matrix already initialized");
        self.initialized = true;
        let up_to = up_to.min(Level::Localized);

        let Self {
            arena,
            targets,
            candidates,
            scope,
            file,
            table,
            ..
        } = self;

        let mut reached = false;
        for (i, &t) in targets.iter().enumerate() {
            if !scope.in_scope(&arena[t]) {
                continue;
            }
            for (j, &c) in candidates.iter().enumerate() {
                if !scope.in_scope(&arena[c]) {
                    continue;
                }
                let mut comp = Comparison::new(t, c, arena, scope.equivalencies());
                if comp.take_to_level(up_to, arena, scope, file) {
                    reached |= comp.level() == up_to;
                    table.insert(i, j, comp);
                }
            }
        }
        debug!(
            "initialized {}x{} matrix with {} comparisons at {}",
            targets.len(),
            candidates.len(),
            table.len(),
            up_to.name()
        );
        reached
    }

    /// Promote every good comparison one level at a time until the matrix
    /// reaches `level` or nothing survives. Returns whether anything did.
    pub fn bring_to_level(&mut self, level: Level) -> bool {
        if !self.initialized {
            self.initialize(level.previous().unwrap_or(Level::Started));
        }
        while self.level < level && self.continuable {
            match self.level.next() {
                Some(next) => self.move_up_to(next),
                None => break,
            }
        }
        self.continuable
    }

    fn move_up_to(&mut self, next: Level) {
        let Self {
            arena,
            targets,
            candidates,
            scope,
            file,
            table,
            level,
            filtered,
            ..
        } = self;

        let mut found_targets = vec![false; targets.len()];
        let mut found_candidates = vec![false; candidates.len()];
        let mut total = Surreal::zero();
        let mut continuable = false;

        for (t, c, comp) in table.iter_mut() {
            if !is_good(comp, *level, *filtered) {
                continue;
            }
            let passed = match next {
                Level::Matched => comp.try_match(arena, scope),
                Level::Detected => comp.detect(arena, scope, file),
                Level::Localized => comp.localize(arena, scope, file),
                Level::Statisticed => comp.statistical(arena, scope),
                Level::Uncomparable | Level::Started | Level::Complete => false,
            };
            if passed {
                total.add_distance(comp.distance());
                found_targets[t] = true;
                found_candidates[c] = true;
                continuable = true;
            }
        }
        let unexplained = found_targets.iter().chain(&found_candidates).filter(|f| !**f).count();
        total.add_units(unexplained as i64, 0.0);

        self.level = next;
        self.continuable = continuable;
        self.total = total;
        debug!("matrix at {} with total {}", next.name(), total);
    }

    /// Sum of every good distance, plus one infinity unit for each target or
    /// candidate without a good comparison.
    pub fn complete_sum(&self) -> Surreal {
        let all = Submatrix {
            targets: (0..self.targets.len()).collect(),
            candidates: (0..self.candidates.len()).collect(),
        };
        self.submatrix_sum(&all)
    }

    /// `complete_sum` restricted to one component.
    pub fn submatrix_sum(&self, sub: &Submatrix) -> Surreal {
        let mut total = Surreal::zero();
        let mut found_targets = BTreeSet::new();
        let mut found_candidates = BTreeSet::new();
        for (t, c) in self.good_edges(sub) {
            if let Some(comp) = self.table.get(t, c) {
                total.add_distance(comp.distance());
            }
            found_targets.insert(t);
            found_candidates.insert(c);
        }
        let unexplained = (sub.targets.len() - found_targets.len())
            + (sub.candidates.len() - found_candidates.len());
        total.add_units(unexplained as i64, 0.0);
        total
    }

    // ===== Filtering =====

    /// Run a match filter over every connected component and sum the
    /// results. After `Multiple`, the ids of every descriptor still in a
    /// good comparison are recorded so merged pieces are not reported.
    pub fn remove_duplicates(&mut self, kind: FilterKind) -> Surreal {
        let mut mask = self.good_edge_mask();
        let mut total = Surreal::zero();
        while let Some(sub) = self.next_submatrix(&mut mask) {
            total += kind.apply(self, &sub);
        }
        self.filtered = kind;
        if kind == FilterKind::Multiple {
            self.collect_merged_ids();
        }
        self.total = total;
        debug!("filtered with {} for total {}", kind.name(), total);
        total
    }

    fn collect_merged_ids(&mut self) {
        let mut merged_targets = BTreeSet::new();
        let mut merged_candidates = BTreeSet::new();
        for (_, _, comp) in self.good_comparisons() {
            merged_targets.extend(self.arena[comp.target()].ids.iter().copied());
            merged_candidates.extend(self.arena[comp.candidate()].ids.iter().copied());
        }
        self.merged_targets = merged_targets;
        self.merged_candidates = merged_candidates;
    }

    fn is_merge_lost(merged: &BTreeSet<u32>, descriptor: &Descriptor) -> bool {
        !merged.is_empty() && descriptor.ids.is_subset(merged)
    }

    /// Per target, the candidate indices of its good comparisons.
    pub fn good_edge_mask(&self) -> Vec<BTreeSet<usize>> {
        (0..self.targets.len())
            .map(|t| {
                self.table
                    .rows_in_column(t)
                    .filter(|&c| self.is_good_at(t, c))
                    .collect()
            })
            .collect()
    }

    /// Take the next connected component out of `mask`.
    ///
    /// Starts from the last target with a remaining edge and its last
    /// candidate, then alternately expands across target and candidate
    /// adjacency until nothing new is reached. Every edge of the returned
    /// component is removed from `mask`.
    pub fn next_submatrix(&self, mask: &mut [BTreeSet<usize>]) -> Option<Submatrix> {
        let (seed_t, seed_c) = mask
            .iter()
            .enumerate()
            .rev()
            .find_map(|(t, row)| row.iter().next_back().map(|&c| (t, c)))?;

        let mut targets = BTreeSet::from([seed_t]);
        let mut candidates = BTreeSet::from([seed_c]);
        loop {
            let mut expanded = false;
            for &t in &targets {
                for c in self.table.rows_in_column(t) {
                    if self.is_good_at(t, c) && candidates.insert(c) {
                        expanded = true;
                    }
                }
            }
            for &c in &candidates {
                for t in self.table.columns_in_row(c) {
                    if self.is_good_at(t, c) && targets.insert(t) {
                        expanded = true;
                    }
                }
            }
            if !expanded {
                break;
            }
        }

        for &t in &targets {
            if let Some(row) = mask.get_mut(t) {
                row.retain(|c| !candidates.contains(c));
            }
        }
        Some(Submatrix {
            targets: targets.into_iter().collect(),
            candidates: candidates.into_iter().collect(),
        })
    }

    /// Every connected component of good comparisons.
    pub fn submatrices(&self) -> Vec<Submatrix> {
        let mut mask = self.good_edge_mask();
        std::iter::from_fn(|| self.next_submatrix(&mut mask)).collect()
    }

    // ===== Composition support =====

    /// Store a descriptor created while filtering.
    pub(crate) fn insert_descriptor(&mut self, descriptor: Descriptor) -> DescKey {
        self.arena.insert(descriptor)
    }

    /// Compose several same-role descriptors over their in-scope attributes.
    pub(crate) fn compose_all(&self, parts: &[&Descriptor]) -> Result<Descriptor> {
        let Some((first, rest)) = parts.split_first() else {
            return Err(crate::Error::BadData("empty composition".to_string()));
        };
        let attributes = self.scope.in_scope_attributes(first);
        let mut composed = (*first).clone();
        for part in rest {
            composed = composed.compose(part, &attributes)?;
        }
        Ok(composed)
    }

    /// Distance of a free-standing pair taken to the matrix level.
    pub(crate) fn trial_distance(&self, target: &Descriptor, candidate: &Descriptor) -> f64 {
        let mut arena = DescriptorArena::new();
        let t = arena.insert(target.clone());
        let c = arena.insert(candidate.clone());
        let mut comp = Comparison::new(t, c, &arena, self.scope.equivalencies());
        comp.take_to_level(self.level, &arena, &self.scope, &self.file);
        comp.distance()
    }

    /// Point the comparison stored at `(column, row)` at a new pair and take
    /// it back to the matrix level. Returns the new distance.
    pub(crate) fn reset_comparison(
        &mut self,
        column: usize,
        row: usize,
        target: DescKey,
        candidate: DescKey,
    ) -> f64 {
        let Self {
            arena,
            scope,
            file,
            table,
            level,
            ..
        } = self;
        match table.get_mut(column, row) {
            Some(comp) => {
                comp.reset(target, candidate, arena, scope.equivalencies());
                comp.take_to_level(*level, arena, scope, file);
                comp.distance()
            }
            None => f64::INFINITY,
        }
    }

    /// Snapshot of the comparisons inside one component.
    pub(crate) fn snapshot(&self, sub: &Submatrix) -> Vec<(usize, usize, Comparison)> {
        sub.targets
            .iter()
            .flat_map(|&t| {
                self.table
                    .rows_in_column(t)
                    .filter(move |&c| sub.contains(t, c))
                    .filter_map(move |c| self.table.get(t, c).map(|comp| (t, c, comp.clone())))
            })
            .collect()
    }

    pub(crate) fn restore(&mut self, snapshot: Vec<(usize, usize, Comparison)>) {
        for (t, c, comp) in snapshot {
            self.table.insert(t, c, comp);
        }
    }

    // ===== Reporting =====

    /// Report the targets and candidates that stopped having a good
    /// comparison at the current level.
    pub fn report_false_and_missed(&self, report: &mut Report) {
        let filtered = self.filtered != FilterKind::None;
        let scope = &self.scope;

        if self.level <= Level::Matched {
            for c in 0..self.candidates.len() {
                let fine = self.table.columns_in_row(c).any(|t| self.is_good_at(t, c));
                let desc = self.candidate(c);
                if !fine && scope.is_outputable_candidate(desc) {
                    report.push(ReportKind::False, self.level, filtered, desc.to_string());
                }
            }
            for t in 0..self.targets.len() {
                let fine = self.table.rows_in_column(t).any(|c| self.is_good_at(t, c));
                let desc = self.target(t);
                if !fine && scope.is_outputable_target(desc) {
                    report.push(ReportKind::Missed, self.level, filtered, desc.to_string());
                }
            }
            return;
        }

        for c in 0..self.candidates.len() {
            let comps: Vec<&Comparison> = self
                .table
                .columns_in_row(c)
                .filter_map(|t| self.table.get(t, c))
                .collect();
            if comps.is_empty() {
                continue;
            }
            let fine = comps.iter().any(|comp| self.good_comp(comp));
            let already = comps.iter().all(|comp| self.long_dead_comp(comp));
            let desc = self.candidate(c);
            if !fine
                && !already
                && scope.is_outputable_candidate(desc)
                && !Self::is_merge_lost(&self.merged_candidates, desc)
            {
                report.push(ReportKind::False, self.level, filtered, desc.to_string());
            }
        }
        for t in 0..self.targets.len() {
            let comps: Vec<&Comparison> = self
                .table
                .rows_in_column(t)
                .filter_map(|c| self.table.get(t, c))
                .collect();
            if comps.is_empty() {
                continue;
            }
            let fine = comps.iter().any(|comp| self.good_comp(comp));
            let already = comps.iter().all(|comp| self.long_dead_comp(comp));
            let desc = self.target(t);
            if !fine
                && !already
                && scope.is_outputable_target(desc)
                && !Self::is_merge_lost(&self.merged_targets, desc)
            {
                report.push(ReportKind::Missed, self.level, filtered, desc.to_string());
            }
        }
    }

    /// Report every outputable target with its good, outputable partners.
    ///
    /// The detail is the span distance of the target against the union of
    /// its partners, the partner count, and per partner its id, span
    /// distance and mean attribute distances.
    pub fn report_candidates(&self, report: &mut Report) {
        let filtered = self.filtered != FilterKind::None;
        for t in 0..self.targets.len() {
            let target = self.target(t);
            if !self.scope.is_outputable_target(target) {
                continue;
            }
            let Some(measure) = self.scope.span_measure(target) else {
                continue;
            };

            let mut partners = Vec::new();
            let mut match_span = FrameSpan::empty();
            let mut union_span = FrameSpan::empty();
            for c in self.table.rows_in_column(t) {
                let Some(comp) = self.table.get(t, c) else {
                    continue;
                };
                let candidate = &self.arena[comp.candidate()];
                if !self.good_comp(comp) || !self.scope.is_outputable_candidate(candidate) {
                    continue;
                }
                match_span = match_span.union(comp.match_span());
                union_span = union_span.union(&candidate.span);
                let span_distance = Difference::spans(&target.span, &candidate.span, None, None)
                    .map_or(f64::NAN, |d| measure.metric.distance(&d));
                partners.push(format!(
                    "[{} {} {}]",
                    candidate.id_label(),
                    span_distance,
                    comp.distances_line(Statistic::Mean)
                ));
            }
            if partners.is_empty() {
                continue;
            }

            let ignore = union_span.minus(&match_span);
            let overall = Difference::spans(&target.span, &union_span, None, Some(&ignore))
                .map_or(f64::NAN, |d| measure.metric.distance(&d));
            let line = format!(
                "{}\t{} {} {}",
                target,
                overall,
                partners.len(),
                partners.concat()
            );
            report.push(ReportKind::Detect, self.level, filtered, line);
        }
    }

    /// Add hit and missed counts for one descriptor type.
    ///
    /// A target is hit when it has a good comparison with an outputable
    /// candidate. Targets whose only good comparisons are with hidden
    /// candidates are not counted at all. Candidates are symmetric.
    pub fn add_pr_info(&self, category: Category, name: &str, counts: &mut PrecisionRecall) {
        let eq = self.scope.equivalencies();

        for t in 0..self.targets.len() {
            let target = self.target(t);
            if target.category != category
                || !eq.names_match(&target.name, name)
                || !self.scope.is_outputable_target(target)
            {
                continue;
            }
            let mut found = false;
            let mut visible = false;
            for c in self.table.rows_in_column(t) {
                if self.is_good_at(t, c) {
                    found = true;
                    if self.scope.is_outputable_candidate(self.candidate(c)) {
                        visible = true;
                        break;
                    }
                }
            }
            if visible || !found {
                if !found && !Self::is_merge_lost(&self.merged_targets, target) {
                    counts.targets_missed += 1;
                } else {
                    counts.targets_hit += 1;
                }
            }
        }

        for c in 0..self.candidates.len() {
            let candidate = self.candidate(c);
            if candidate.category != category
                || !eq.names_match(&candidate.name, name)
                || !self.scope.is_outputable_candidate(candidate)
            {
                continue;
            }
            let mut found = false;
            let mut visible = false;
            for t in self.table.columns_in_row(c) {
                if self.is_good_at(t, c) {
                    found = true;
                    if self.scope.is_outputable_target(self.target(t)) {
                        visible = true;
                        break;
                    }
                }
            }
            if visible || !found {
                if !found && !Self::is_merge_lost(&self.merged_candidates, candidate) {
                    counts.candidates_missed += 1;
                } else {
                    counts.candidates_hit += 1;
                }
            }
        }
    }
}
