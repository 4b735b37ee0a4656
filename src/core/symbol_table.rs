// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Scoped symbol table.
//!
//! Scopes form a stack with the permanent global scope at the bottom.
//! Namespaces persist after they are left and may nest (`A::B`). Ephemeral
//! scopes back macro calls and loop iterations; their symbols are dropped on
//! pop but retained under the caller's key so the same scope can be seeded
//! in the next pass, which keeps forward references inside bodies working.

use std::collections::HashMap;

use crate::core::text_utils::normalize_name;
use crate::core::value::Value;

pub type ScopeId = usize;

pub const GLOBAL_SCOPE: ScopeId = 0;

/// Separator between a namespace path and a symbol name.
pub const NAMESPACE_SEPARATOR: &str = "::";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Namespace,
    Ephemeral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub value: Value,
    pub scope: ScopeId,
    /// Defined in a persistent scope and visible in the exported symbol list.
    pub global: bool,
    /// Pass in which the symbol was last defined.
    pub pass: u8,
}

#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolTableResult {
    Ok,
    Duplicate,
    NotFound,
    Refused,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    /// Full namespace path; empty for the global and ephemeral scopes.
    path: String,
    symbols: HashMap<String, Symbol>,
}

#[derive(Debug)]
pub struct SymbolTable {
    scopes: HashMap<ScopeId, Scope>,
    namespaces: HashMap<String, ScopeId>,
    stack: Vec<ScopeId>,
    retired: HashMap<usize, HashMap<String, Symbol>>,
    next_id: ScopeId,
    pass: u8,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut scopes = HashMap::new();
        scopes.insert(
            GLOBAL_SCOPE,
            Scope {
                kind: ScopeKind::Global,
                path: String::new(),
                symbols: HashMap::new(),
            },
        );
        Self {
            scopes,
            namespaces: HashMap::new(),
            stack: vec![GLOBAL_SCOPE],
            retired: HashMap::new(),
            next_id: GLOBAL_SCOPE + 1,
            pass: 1,
        }
    }

    /// Start a pass. Symbols survive; the scope stack is reset to global.
    pub fn begin_pass(&mut self, pass: u8) {
        while let Some(&top) = self.stack.last() {
            if top == GLOBAL_SCOPE {
                break;
            }
            self.stack.pop();
            if self.kind_of(top) == Some(ScopeKind::Ephemeral) {
                self.scopes.remove(&top);
            }
        }
        self.pass = pass;
    }

    pub fn pass(&self) -> u8 {
        self.pass
    }

    pub fn current_scope(&self) -> ScopeId {
        self.stack.last().copied().unwrap_or(GLOBAL_SCOPE)
    }

    pub fn kind_of(&self, scope: ScopeId) -> Option<ScopeKind> {
        self.scopes.get(&scope).map(|s| s.kind)
    }

    /// Full path of the innermost active namespace, if any.
    pub fn current_namespace(&self) -> Option<&str> {
        self.stack
            .iter()
            .rev()
            .filter_map(|id| self.scopes.get(id))
            .find(|scope| scope.kind == ScopeKind::Namespace)
            .map(|scope| scope.path.as_str())
    }

    /// Define `name` in the innermost scope.
    pub fn define(&mut self, name: &str, value: Value) -> SymbolTableResult {
        let key = normalize_name(name);
        let scope_id = self.current_scope();
        let pass = self.pass;
        let Some(scope) = self.scopes.get_mut(&scope_id) else {
            return SymbolTableResult::Refused;
        };
        let global = scope.kind != ScopeKind::Ephemeral;
        match scope.symbols.get_mut(&key) {
            Some(existing) if existing.pass == pass => SymbolTableResult::Duplicate,
            Some(existing) => {
                existing.value = value;
                existing.pass = pass;
                SymbolTableResult::Ok
            }
            None => {
                scope.symbols.insert(
                    key.clone(),
                    Symbol {
                        name: key,
                        value,
                        scope: scope_id,
                        global,
                        pass,
                    },
                );
                SymbolTableResult::Ok
            }
        }
    }

    /// Overwrite an existing symbol, searching innermost scope first.
    pub fn set(&mut self, name: &str, value: Value) -> SymbolTableResult {
        let Some(scope_id) = self.find_scope_of(name) else {
            return SymbolTableResult::NotFound;
        };
        let key = self.symbol_key(name);
        let pass = self.pass;
        match self
            .scopes
            .get_mut(&scope_id)
            .and_then(|scope| scope.symbols.get_mut(&key))
        {
            Some(symbol) => {
                symbol.value = value;
                symbol.pass = pass;
                SymbolTableResult::Ok
            }
            None => SymbolTableResult::NotFound,
        }
    }

    /// `set` when the name is visible, otherwise `define` in the innermost scope.
    pub fn assign(&mut self, name: &str, value: Value) -> SymbolTableResult {
        match self.set(name, value.clone()) {
            SymbolTableResult::NotFound => self.define(name, value),
            other => other,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.entry(name).map(|symbol| &symbol.value)
    }

    pub fn entry(&self, name: &str) -> Option<&Symbol> {
        let scope_id = self.find_scope_of(name)?;
        let key = self.symbol_key(name);
        self.scopes.get(&scope_id)?.symbols.get(&key)
    }

    /// Open an ephemeral scope, seeded from the symbols retired under `key`
    /// in the previous pass.
    pub fn push_scope(&mut self, key: usize) -> ScopeId {
        let id = self.allocate_id();
        let symbols = self
            .retired
            .get(&key)
            .map(|retired| {
                retired
                    .iter()
                    .map(|(name, symbol)| {
                        let mut symbol = symbol.clone();
                        symbol.scope = id;
                        (name.clone(), symbol)
                    })
                    .collect()
            })
            .unwrap_or_default();
        self.scopes.insert(
            id,
            Scope {
                kind: ScopeKind::Ephemeral,
                path: format!("#{key}"),
                symbols,
            },
        );
        self.stack.push(id);
        id
    }

    /// Close the innermost ephemeral scope, retaining its symbols under its key.
    pub fn pop_scope(&mut self) -> SymbolTableResult {
        let top = self.current_scope();
        if self.kind_of(top) != Some(ScopeKind::Ephemeral) {
            return SymbolTableResult::Refused;
        }
        self.stack.pop();
        if let Some(scope) = self.scopes.remove(&top) {
            if let Some(key) = scope
                .path
                .strip_prefix('#')
                .and_then(|k| k.parse::<usize>().ok())
            {
                self.retired.insert(key, scope.symbols);
            }
        }
        SymbolTableResult::Ok
    }

    /// Enter namespace `name`, nested in the innermost active namespace.
    pub fn push_namespace(&mut self, name: &str) -> ScopeId {
        let name = normalize_name(name);
        let path = match self.current_namespace() {
            Some(outer) => format!("{outer}{NAMESPACE_SEPARATOR}{name}"),
            None => name,
        };
        let id = match self.namespaces.get(&path) {
            Some(&id) => id,
            None => {
                let id = self.allocate_id();
                self.scopes.insert(
                    id,
                    Scope {
                        kind: ScopeKind::Namespace,
                        path: path.clone(),
                        symbols: HashMap::new(),
                    },
                );
                self.namespaces.insert(path, id);
                id
            }
        };
        self.stack.push(id);
        id
    }

    pub fn pop_namespace(&mut self) -> SymbolTableResult {
        let top = self.current_scope();
        if self.kind_of(top) != Some(ScopeKind::Namespace) {
            return SymbolTableResult::Refused;
        }
        self.stack.pop();
        SymbolTableResult::Ok
    }

    /// Every visible symbol name, namespace members in qualified form.
    pub fn all_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .scopes
            .values()
            .flat_map(|scope| {
                scope.symbols.keys().map(move |name| {
                    if scope.kind == ScopeKind::Namespace {
                        format!("{}{NAMESPACE_SEPARATOR}{name}", scope.path)
                    } else {
                        name.clone()
                    }
                })
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Symbols of the global scope and all namespaces, sorted by qualified name.
    pub fn exported(&self) -> Vec<(String, Value)> {
        let mut out: Vec<(String, Value)> = self
            .scopes
            .values()
            .filter(|scope| scope.kind != ScopeKind::Ephemeral)
            .flat_map(|scope| {
                scope.symbols.values().map(move |symbol| {
                    let name = if scope.path.is_empty() {
                        symbol.name.clone()
                    } else {
                        format!("{}{NAMESPACE_SEPARATOR}{}", scope.path, symbol.name)
                    };
                    (name, symbol.value.clone())
                })
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    fn allocate_id(&mut self) -> ScopeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn symbol_key(&self, name: &str) -> String {
        let name = normalize_name(name);
        match name.rsplit_once(NAMESPACE_SEPARATOR) {
            Some((_, symbol)) => symbol.to_string(),
            None => name,
        }
    }

    /// Scope that holds `name`, honouring qualified `NS::NAME` forms.
    fn find_scope_of(&self, name: &str) -> Option<ScopeId> {
        let name = normalize_name(name);
        if let Some((path, symbol)) = name.rsplit_once(NAMESPACE_SEPARATOR) {
            return self.find_qualified(path, symbol);
        }
        self.stack
            .iter()
            .rev()
            .copied()
            .find(|id| {
                self.scopes
                    .get(id)
                    .is_some_and(|scope| scope.symbols.contains_key(&name))
            })
    }

    /// Try the path as written, then relative to each active namespace.
    fn find_qualified(&self, path: &str, symbol: &str) -> Option<ScopeId> {
        let holds = |id: &ScopeId| {
            self.scopes
                .get(id)
                .is_some_and(|scope| scope.symbols.contains_key(symbol))
        };
        if let Some(id) = self.namespaces.get(path).filter(|id| holds(id)) {
            return Some(*id);
        }
        self.stack
            .iter()
            .rev()
            .filter_map(|id| self.scopes.get(id))
            .filter(|scope| scope.kind == ScopeKind::Namespace)
            .filter_map(|scope| {
                self.namespaces
                    .get(&format!("{}{NAMESPACE_SEPARATOR}{path}", scope.path))
            })
            .copied()
            .find(|id| holds(id))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: i64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn define_rejects_duplicates_within_a_pass() {
        let mut table = SymbolTable::new();
        assert_eq!(table.define("start", num(1)), SymbolTableResult::Ok);
        assert_eq!(table.define("START", num(2)), SymbolTableResult::Duplicate);
        assert_eq!(table.lookup("Start"), Some(&num(1)));

        table.begin_pass(2);
        assert_eq!(table.define("start", num(3)), SymbolTableResult::Ok);
        assert_eq!(table.lookup("start"), Some(&num(3)));
        assert_eq!(table.define("start", num(4)), SymbolTableResult::Duplicate);
    }

    #[test]
    fn set_requires_existing_symbol_and_assign_falls_back() {
        let mut table = SymbolTable::new();
        assert_eq!(table.set("x", num(1)), SymbolTableResult::NotFound);
        assert_eq!(table.assign("x", num(1)), SymbolTableResult::Ok);
        assert_eq!(table.assign("x", num(2)), SymbolTableResult::Ok);
        assert_eq!(table.lookup("X"), Some(&num(2)));
    }

    #[test]
    fn ephemeral_scopes_shadow_and_vanish() {
        let mut table = SymbolTable::new();
        let _ = table.define("tmp", num(1));
        table.push_scope(0);
        let _ = table.define("tmp", num(2));
        let _ = table.define("inner", num(3));
        assert_eq!(table.lookup("tmp"), Some(&num(2)));
        assert_eq!(table.pop_scope(), SymbolTableResult::Ok);
        assert_eq!(table.lookup("tmp"), Some(&num(1)));
        assert_eq!(table.lookup("inner"), None);
        assert_eq!(table.pop_scope(), SymbolTableResult::Refused);
    }

    #[test]
    fn retired_scope_seeds_the_next_pass() {
        let mut table = SymbolTable::new();
        table.push_scope(7);
        let _ = table.define("later", num(0x1234));
        let _ = table.pop_scope();

        table.begin_pass(2);
        table.push_scope(7);
        assert_eq!(table.lookup("later"), Some(&num(0x1234)));
        assert_eq!(table.define("later", num(0x1235)), SymbolTableResult::Ok);
        let _ = table.pop_scope();

        table.push_scope(8);
        assert_eq!(table.lookup("later"), None);
    }

    #[test]
    fn namespaces_persist_and_nest() {
        let mut table = SymbolTable::new();
        table.push_namespace("gfx");
        let _ = table.define("width", num(40));
        table.push_namespace("colors");
        let _ = table.define("red", num(2));
        assert_eq!(table.current_namespace(), Some("GFX::COLORS"));
        assert_eq!(table.pop_namespace(), SymbolTableResult::Ok);
        assert_eq!(table.lookup("colors::red"), Some(&num(2)));
        assert_eq!(table.pop_namespace(), SymbolTableResult::Ok);
        assert_eq!(table.pop_namespace(), SymbolTableResult::Refused);

        assert_eq!(table.lookup("width"), None);
        assert_eq!(table.lookup("GFX::width"), Some(&num(40)));
        assert_eq!(table.lookup("gfx::colors::red"), Some(&num(2)));
        assert_eq!(table.lookup("gfx::missing"), None);
    }

    #[test]
    fn namespace_pop_refused_inside_ephemeral_scope() {
        let mut table = SymbolTable::new();
        table.push_namespace("ns");
        table.push_scope(0);
        assert_eq!(table.pop_namespace(), SymbolTableResult::Refused);
        assert_eq!(table.pop_scope(), SymbolTableResult::Ok);
        assert_eq!(table.pop_namespace(), SymbolTableResult::Ok);
    }

    #[test]
    fn exported_lists_persistent_symbols_qualified() {
        let mut table = SymbolTable::new();
        let _ = table.define("main", num(0x1000));
        table.push_namespace("io");
        let _ = table.define("port", num(0xd000));
        let _ = table.pop_namespace();
        table.push_scope(0);
        let _ = table.define("hidden", num(1));
        let names: Vec<String> = table.exported().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["IO::PORT".to_string(), "MAIN".to_string()]);
        assert!(table.all_names().contains(&"HIDDEN".to_string()));
    }
}
