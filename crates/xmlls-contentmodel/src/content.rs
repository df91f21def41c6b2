//! Element content models and the matcher that checks children against
//! them.
//!
//! A particle tree is compiled once into a small NFA (Thompson
//! construction). Matching walks the children of one element through it,
//! which also yields the names that were acceptable at the point where the
//! children stopped matching.

use std::collections::BTreeSet;

/// Allowed content of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentModel {
    /// No children, no text.
    Empty,
    /// Anything.
    Any,
    /// Character data only.
    Text,
    /// Text mixed with any number of the listed elements, in any order.
    Mixed(Vec<String>),
    /// Elements matching `particle`; text only if `mixed`.
    Elements { particle: Particle, mixed: bool },
}

impl ContentModel {
    pub fn allows_text(&self) -> bool {
        match self {
            ContentModel::Empty => false,
            ContentModel::Elements { mixed, .. } => *mixed,
            ContentModel::Any | ContentModel::Text | ContentModel::Mixed(_) => true,
        }
    }

    pub(crate) fn compile(&self) -> Automaton {
        let mut builder = Automaton::builder();
        let (start, end) = match self {
            ContentModel::Empty | ContentModel::Text => builder.epsilon(),
            ContentModel::Any => {
                let any = Particle::new(Term::Any, 0, None);
                builder.particle(&any)
            }
            ContentModel::Mixed(names) => {
                let choice = names
                    .iter()
                    .map(|name| Particle::element(name))
                    .collect::<Vec<_>>();
                builder.particle(&Particle::new(Term::Choice(choice), 0, None))
            }
            ContentModel::Elements { particle, .. } => builder.particle(particle),
        };
        builder.finish(start, end)
    }
}

/// A term with its occurrence bounds. `max == None` is unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Particle {
    pub term: Term,
    pub min: u32,
    pub max: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Element(String),
    Sequence(Vec<Particle>),
    Choice(Vec<Particle>),
    /// Wildcard (`xs:any`).
    Any,
}

impl Particle {
    pub fn new(term: Term, min: u32, max: Option<u32>) -> Self {
        Self { term, min, max }
    }

    pub fn element(name: impl Into<String>) -> Self {
        Self::new(Term::Element(name.into()), 1, Some(1))
    }

    pub fn with_occurrence(mut self, min: u32, max: Option<u32>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Apply a DTD occurrence indicator (`?`, `*`, `+`).
    pub fn with_indicator(self, indicator: Option<char>) -> Self {
        match indicator {
            Some('?') => self.with_occurrence(0, Some(1)),
            Some('*') => self.with_occurrence(0, None),
            Some('+') => self.with_occurrence(1, None),
            _ => self,
        }
    }

    /// Element names this particle can contain, in declaration order.
    pub fn element_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match &self.term {
            Term::Element(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Term::Sequence(items) | Term::Choice(items) => {
                for item in items {
                    item.collect_names(names);
                }
            }
            Term::Any => {}
        }
    }
}

// Copies of a particle beyond this bound are folded into an unbounded loop.
const MAX_UNROLLED: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Label {
    Name(String),
    Any,
}

#[derive(Debug, Default)]
struct State {
    epsilon: Vec<usize>,
    edges: Vec<(Label, usize)>,
}

#[derive(Debug)]
pub(crate) struct Automaton {
    states: Vec<State>,
    start: usize,
    accept: usize,
}

struct Builder {
    states: Vec<State>,
}

impl Automaton {
    fn builder() -> Builder {
        Builder { states: Vec::new() }
    }

    fn closure(&self, seed: impl IntoIterator<Item = usize>) -> BTreeSet<usize> {
        let mut set = BTreeSet::new();
        let mut pending: Vec<usize> = seed.into_iter().collect();
        while let Some(state) = pending.pop() {
            if set.insert(state) {
                pending.extend(self.states[state].epsilon.iter().copied());
            }
        }
        set
    }

    pub(crate) fn matcher(&self) -> ContentMatcher<'_> {
        ContentMatcher {
            automaton: self,
            current: self.closure([self.start]),
        }
    }
}

impl Builder {
    fn state(&mut self) -> usize {
        self.states.push(State::default());
        self.states.len() - 1
    }

    fn link(&mut self, from: usize, to: usize) {
        self.states[from].epsilon.push(to);
    }

    fn epsilon(&mut self) -> (usize, usize) {
        let start = self.state();
        let end = self.state();
        self.link(start, end);
        (start, end)
    }

    fn term(&mut self, term: &Term) -> (usize, usize) {
        match term {
            Term::Element(name) => {
                let start = self.state();
                let end = self.state();
                self.states[start].edges.push((Label::Name(name.clone()), end));
                (start, end)
            }
            Term::Any => {
                let start = self.state();
                let end = self.state();
                self.states[start].edges.push((Label::Any, end));
                (start, end)
            }
            Term::Sequence(items) => {
                let (start, mut end) = self.epsilon();
                for item in items {
                    let (item_start, item_end) = self.particle(item);
                    self.link(end, item_start);
                    end = item_end;
                }
                (start, end)
            }
            Term::Choice(items) => {
                let start = self.state();
                let end = self.state();
                for item in items {
                    let (item_start, item_end) = self.particle(item);
                    self.link(start, item_start);
                    self.link(item_end, end);
                }
                (start, end)
            }
        }
    }

    fn particle(&mut self, particle: &Particle) -> (usize, usize) {
        let (start, mut end) = self.epsilon();
        let min = particle.min.min(MAX_UNROLLED);
        for _ in 0..min {
            let (copy_start, copy_end) = self.term(&particle.term);
            self.link(end, copy_start);
            end = copy_end;
        }
        let optional = match particle.max {
            Some(max) if max <= MAX_UNROLLED => Some(max.saturating_sub(min)),
            _ => None,
        };
        match optional {
            Some(count) => {
                let exit = self.state();
                self.link(end, exit);
                for _ in 0..count {
                    let (copy_start, copy_end) = self.term(&particle.term);
                    self.link(end, copy_start);
                    self.link(copy_end, exit);
                    end = copy_end;
                }
                (start, exit)
            }
            None => {
                let (loop_start, loop_end) = self.term(&particle.term);
                let exit = self.state();
                self.link(end, loop_start);
                self.link(end, exit);
                self.link(loop_end, loop_start);
                self.link(loop_end, exit);
                (start, exit)
            }
        }
    }

    fn finish(self, start: usize, accept: usize) -> Automaton {
        Automaton {
            states: self.states,
            start,
            accept,
        }
    }
}

/// Incremental check of an element's children against its content model.
#[derive(Debug, Clone)]
pub struct ContentMatcher<'a> {
    automaton: &'a Automaton,
    current: BTreeSet<usize>,
}

impl ContentMatcher<'_> {
    /// Consume a child element name. Returns `false` (leaving the state
    /// unchanged) if the name is not acceptable here.
    pub fn accept(&mut self, name: &str) -> bool {
        let next: Vec<usize> = self
            .current
            .iter()
            .flat_map(|state| self.automaton.states[*state].edges.iter())
            .filter(|(label, _)| match label {
                Label::Name(expected) => expected == name,
                Label::Any => true,
            })
            .map(|(_, target)| *target)
            .collect();
        if next.is_empty() {
            return false;
        }
        self.current = self.automaton.closure(next);
        true
    }

    /// Whether the children seen so far form complete content.
    pub fn is_complete(&self) -> bool {
        self.current.contains(&self.automaton.accept)
    }

    /// Element names acceptable next, in model order. A wildcard shows as
    /// `*`.
    pub fn expected(&self) -> Vec<String> {
        let mut names: Vec<(usize, String)> = Vec::new();
        for state in &self.current {
            for (label, target) in &self.automaton.states[*state].edges {
                let name = match label {
                    Label::Name(name) => name.clone(),
                    Label::Any => "*".to_string(),
                };
                if !names.iter().any(|(_, existing)| *existing == name) {
                    names.push((*target, name));
                }
            }
        }
        names.sort_by_key(|(target, _)| *target);
        names.into_iter().map(|(_, name)| name).collect()
    }

    /// Whether a wildcard accepts the next child.
    pub fn expects_any(&self) -> bool {
        self.current.iter().any(|state| {
            self.automaton.states[*state]
                .edges
                .iter()
                .any(|(label, _)| *label == Label::Any)
        })
    }
}
