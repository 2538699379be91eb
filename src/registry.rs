use crate::types::{AiRule, KeywordItem, KeywordRule, RuleKind, Source, View};
use std::collections::HashMap;
use tracing::{debug, info};

/// In-memory registry of sources, views, and filter rules plus their
/// associations. Pure data; persistence of the registry itself is the
/// embedding application's concern.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: HashMap<i64, Source>,
    views: HashMap<i64, View>,
    keyword_rules: HashMap<i64, KeywordRule>,
    ai_rules: HashMap<i64, AiRule>,
    next_id: i64,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn add_source(
        &mut self,
        name: impl Into<String>,
        url: impl Into<String>,
        tz_offset_minutes: Option<i32>,
    ) -> i64 {
        let id = self.allocate_id();
        let source = Source {
            id,
            name: name.into(),
            url: url.into(),
            tz_offset_minutes,
        };
        info!("registered source {} ({})", id, source.url);
        self.sources.insert(id, source);
        id
    }

    /// Import a plain-text list of newline-separated endpoint URLs. Blank
    /// lines and case-insensitive duplicates of already-registered URLs are
    /// skipped; every other line becomes a new source with an empty display
    /// name. Lines that turn out not to be fetchable endpoints surface later
    /// as per-endpoint fetch failures, never as dropped input. Returns the
    /// new source ids.
    pub fn import_source_list(&mut self, text: &str) -> Vec<i64> {
        let mut created = Vec::new();
        for line in text.lines() {
            let candidate = line.trim();
            if candidate.is_empty() {
                continue;
            }
            let lowered = candidate.to_lowercase();
            let duplicate = self
                .sources
                .values()
                .any(|s| s.url.to_lowercase() == lowered);
            if duplicate {
                debug!("skipping duplicate source URL: {}", candidate);
                continue;
            }
            created.push(self.add_source("", candidate, None));
        }
        info!("imported {} new sources", created.len());
        created
    }

    pub fn source(&self, id: i64) -> Option<&Source> {
        self.sources.get(&id)
    }

    pub fn sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.values()
    }

    pub fn add_view(&mut self, name: impl Into<String>, source_ids: Vec<i64>) -> i64 {
        let id = self.allocate_id();
        let view = View {
            id,
            name: name.into(),
            source_ids,
            keyword_rule_ids: Vec::new(),
            ai_whitelist_rule: None,
            ai_blacklist_rule: None,
        };
        self.views.insert(id, view);
        id
    }

    pub fn view(&self, id: i64) -> Option<&View> {
        self.views.get(&id)
    }

    pub fn add_keyword_rule(
        &mut self,
        name: impl Into<String>,
        kind: RuleKind,
        items: Vec<KeywordItem>,
    ) -> i64 {
        let id = self.allocate_id();
        self.keyword_rules.insert(
            id,
            KeywordRule {
                id,
                name: name.into(),
                kind,
                items,
            },
        );
        id
    }

    pub fn add_ai_rule(
        &mut self,
        name: impl Into<String>,
        kind: RuleKind,
        instruction: impl Into<String>,
    ) -> i64 {
        let id = self.allocate_id();
        self.ai_rules.insert(
            id,
            AiRule {
                id,
                name: name.into(),
                kind,
                instruction: instruction.into(),
            },
        );
        id
    }

    pub fn attach_keyword_rule(&mut self, view_id: i64, rule_id: i64) -> bool {
        if !self.keyword_rules.contains_key(&rule_id) {
            return false;
        }
        match self.views.get_mut(&view_id) {
            Some(view) => {
                if !view.keyword_rule_ids.contains(&rule_id) {
                    view.keyword_rule_ids.push(rule_id);
                }
                true
            }
            None => false,
        }
    }

    /// Associate an AI rule with a view. A view carries at most one active
    /// whitelist and one active blacklist rule; setting a rule of either kind
    /// replaces the previous one of that kind.
    pub fn set_ai_rule(&mut self, view_id: i64, rule_id: i64) -> bool {
        let kind = match self.ai_rules.get(&rule_id) {
            Some(rule) => rule.kind,
            None => return false,
        };
        match self.views.get_mut(&view_id) {
            Some(view) => {
                match kind {
                    RuleKind::Whitelist => view.ai_whitelist_rule = Some(rule_id),
                    RuleKind::Blacklist => view.ai_blacklist_rule = Some(rule_id),
                }
                true
            }
            None => false,
        }
    }

    /// Combined whitelist and blacklist keyword sets for a view: every
    /// attached rule contributes its items to the set matching its kind.
    pub fn keyword_sets(&self, view: &View) -> (Vec<KeywordItem>, Vec<KeywordItem>) {
        let mut whitelist = Vec::new();
        let mut blacklist = Vec::new();
        for rule_id in &view.keyword_rule_ids {
            if let Some(rule) = self.keyword_rules.get(rule_id) {
                match rule.kind {
                    RuleKind::Whitelist => whitelist.extend(rule.items.iter().cloned()),
                    RuleKind::Blacklist => blacklist.extend(rule.items.iter().cloned()),
                }
            }
        }
        (whitelist, blacklist)
    }

    /// Instruction texts of the view's active AI rules, whitelist first.
    pub fn ai_rule_texts(&self, view: &View) -> (Option<String>, Option<String>) {
        let text_of = |id: Option<i64>| {
            id.and_then(|id| self.ai_rules.get(&id))
                .map(|rule| rule.instruction.clone())
        };
        (
            text_of(view.ai_whitelist_rule),
            text_of(view.ai_blacklist_rule),
        )
    }

    /// Endpoint map (URL -> source id) for one view, or for every registered
    /// source when `view_id` is `None`.
    pub fn endpoints(&self, view_id: Option<i64>) -> HashMap<String, i64> {
        match view_id {
            Some(id) => match self.views.get(&id) {
                Some(view) => view
                    .source_ids
                    .iter()
                    .filter_map(|sid| self.sources.get(sid))
                    .map(|s| (s.url.clone(), s.id))
                    .collect(),
                None => HashMap::new(),
            },
            None => self
                .sources
                .values()
                .map(|s| (s.url.clone(), s.id))
                .collect(),
        }
    }
}
