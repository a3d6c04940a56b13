//! Formula evaluation.
//!
//! A formula is segmented into parts; cell addresses resolve recursively
//! through [`Sheet::resolve`], function calls go to the function library and
//! groups are evaluated on their own. The resolved operands are bound as
//! constants in a Rhai scope and the remaining operator text is evaluated as
//! a single Rhai expression. Operands are always floats, so `7/2` is `3.5`.

use rhai::{Dynamic, Engine, Scope};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::cell::{CellContent, ErrorTag, Value};
use super::cell_ref::{CellKey, parse_address, scan_addresses};
use super::cycle::{PassContext, Trip, Unwind};
use super::format::format_value;
use super::segment::{Part, segment};
use super::sheet::Sheet;

const MAX_OPERATIONS: u64 = 100_000;
const MAX_EXPR_DEPTH: usize = 64;
const MAX_STRING_SIZE: usize = 64 * 1024;
const MAX_ARRAY_SIZE: usize = 10_000;

const QUOTE: char = '\'';
/// Rhai operator standing in for `//`.
const FLOOR_DIV: &str = "floordiv";

/// Create the sandboxed Rhai engine used for substituted expressions.
pub fn create_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(MAX_OPERATIONS);
    engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_EXPR_DEPTH);
    engine.set_max_string_size(MAX_STRING_SIZE);
    engine.set_max_array_size(MAX_ARRAY_SIZE);
    // Same precedence as `*` and `/`.
    match engine.register_custom_operator(FLOOR_DIV, 180) {
        Ok(engine) => {
            engine.register_fn(FLOOR_DIV, |a: f64, b: f64| (a / b).floor());
        }
        Err(err) => warn!(error = %err, "floor division unavailable"),
    }
    engine
}

/// How a top-level read treats the cache and text cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvalOptions {
    /// Return a cached value when one exists.
    pub use_cache: bool,
    /// Read text cells as 0.
    pub text_to_zero: bool,
}

impl EvalOptions {
    pub fn numeric() -> Self {
        EvalOptions {
            use_cache: true,
            text_to_zero: true,
        }
    }

    pub fn display() -> Self {
        EvalOptions {
            use_cache: true,
            text_to_zero: false,
        }
    }

    /// Same options, but recompute the top-level cell even if cached.
    pub fn fresh(self) -> Self {
        EvalOptions {
            use_cache: false,
            ..self
        }
    }
}

/// Outcome of [`Sheet::settle`].
pub(crate) enum Settled {
    Value(Value),
    /// A reference loop was found and tagged.
    Loop,
    /// The retry budget ran out. `pending` holds the cells still waiting,
    /// outermost first; `frontier` is where the last attempt stopped.
    Exhausted {
        pending: Vec<CellKey>,
        frontier: CellKey,
    },
}

enum Operand<'a> {
    Value(Value),
    Raw(&'a str),
}

impl Sheet {
    /// Computed value of `key` for numeric use.
    ///
    /// Never fails: evaluation problems come back as [`Value::Error`]. Chains
    /// deeper than the call-depth budget are resolved by evaluating the cell
    /// where the budget ran out first and retrying.
    pub fn value_of(&mut self, key: CellKey) -> Value {
        self.evaluate(key, self.nested_options())
    }

    /// Computed value of `key` with explicit options.
    pub fn evaluate(&mut self, key: CellKey, opts: EvalOptions) -> Value {
        let mut ctx = PassContext::new(self.config.max_call_depth);
        match self.settle(&mut ctx, key, opts, self.config.resolve_attempts) {
            Settled::Value(value) => value,
            Settled::Loop => Value::Error(ErrorTag::Loop),
            Settled::Exhausted { pending, .. } => {
                self.tag_loop(&pending);
                Value::Error(ErrorTag::Loop)
            }
        }
    }

    /// Resolve `key` as a new top-level evaluation. Whenever the depth
    /// budget runs out, the frontier cell is resolved first and the
    /// evaluation retried, at most `attempts` times. A retry that reaches a
    /// cell still waiting on it has found a loop, and every cell touched
    /// along the way is tagged.
    pub(crate) fn settle(
        &mut self,
        ctx: &mut PassContext,
        key: CellKey,
        opts: EvalOptions,
        attempts: usize,
    ) -> Settled {
        let mut pending = vec![key];
        let mut touched = Vec::new();
        let mut retries = 0;
        while let Some((&target, waiting)) = pending.split_last() {
            let target_opts = if waiting.is_empty() {
                opts
            } else {
                self.nested_options()
            };
            ctx.begin_for(waiting);
            match self.resolve(ctx, target, target_opts) {
                Ok(value) => {
                    pending.pop();
                    if pending.is_empty() {
                        return Settled::Value(value);
                    }
                }
                Err(Unwind::Loop { .. }) => {
                    touched.extend(pending);
                    self.tag_loop(&touched);
                    return Settled::Loop;
                }
                Err(Unwind::DepthExceeded { frontier }) => {
                    touched.extend_from_slice(ctx.trail());
                    retries += 1;
                    if retries > attempts {
                        return Settled::Exhausted { pending, frontier };
                    }
                    debug!(
                        cell = %target,
                        %frontier,
                        "depth budget exhausted, resolving frontier first"
                    );
                    pending.push(frontier);
                }
            }
        }
        Settled::Loop
    }

    /// Display text for `key`: empty for absent cells, raw text for text
    /// cells, formatted values otherwise.
    pub fn display_value(&mut self, key: CellKey) -> String {
        self.display_value_with(key, None)
    }

    pub fn display_value_with(&mut self, key: CellKey, precision: Option<usize>) -> String {
        if !self.cells.contains_key(&key) {
            return String::new();
        }
        let value = self.evaluate(key, EvalOptions::display());
        format_value(&value, precision)
    }

    pub(crate) fn nested_options(&self) -> EvalOptions {
        EvalOptions {
            use_cache: true,
            text_to_zero: self.config.text_to_zero,
        }
    }

    /// Evaluate one cell, caching formula and numeric results.
    pub(crate) fn resolve(
        &mut self,
        ctx: &mut PassContext,
        key: CellKey,
        opts: EvalOptions,
    ) -> Result<Value, Unwind> {
        if opts.use_cache
            && let Some(hit) = self.cache.get(&key)
        {
            return Ok(hit.value().clone());
        }
        let Some(content) = self.cells.get(&key).cloned() else {
            return Ok(Value::Number(0.0));
        };
        let value = match content {
            CellContent::Formula(expr) => {
                if let Err(trip) = ctx.enter(key) {
                    return Err(self.trip(ctx, key, trip));
                }
                let result = self.eval_formula(ctx, &expr);
                ctx.leave(key);
                result?
            }
            CellContent::Numeric(text) => self.eval_literal(&text),
            CellContent::Text(text) => {
                return Ok(if opts.text_to_zero {
                    Value::Number(0.0)
                } else {
                    Value::Text(text)
                });
            }
        };
        self.cache.insert(key, value.clone());
        Ok(value)
    }

    /// Resolve a referenced cell one level deeper.
    pub(crate) fn resolve_address(
        &mut self,
        ctx: &mut PassContext,
        key: CellKey,
    ) -> Result<Value, Unwind> {
        ctx.descend();
        let value = self.resolve(ctx, key, self.nested_options());
        ctx.ascend();
        value
    }

    fn eval_formula(&mut self, ctx: &mut PassContext, expr: &str) -> Result<Value, Unwind> {
        if let Some(tag) = structural_tag(expr) {
            return Ok(Value::Error(tag));
        }
        self.eval_expr(ctx, expr)
    }

    fn eval_literal(&mut self, text: &str) -> Value {
        let text = text.trim();
        if let Ok(n) = text.parse::<f64>() {
            return if n.is_finite() {
                Value::Number(n)
            } else {
                Value::Error(ErrorTag::Num)
            };
        }
        if !scan_addresses(text).is_empty() {
            return Value::Error(ErrorTag::Num);
        }
        let mut ctx = PassContext::new(self.config.max_call_depth);
        match self.eval_expr(&mut ctx, text) {
            Ok(Value::Number(n)) if n.is_finite() => Value::Number(n),
            _ => Value::Error(ErrorTag::Num),
        }
    }

    /// Evaluate expression text (no leading `=`).
    pub(crate) fn eval_expr(&mut self, ctx: &mut PassContext, text: &str) -> Result<Value, Unwind> {
        if !ctx.nest() {
            debug!(len = text.len(), "expression nested too deeply");
            return Ok(Value::Error(ErrorTag::Exc));
        }
        let result = self.eval_parts(ctx, text);
        ctx.unnest();
        result
    }

    fn eval_parts(&mut self, ctx: &mut PassContext, text: &str) -> Result<Value, Unwind> {
        let parts = segment(text);
        if parts.is_empty() {
            return Ok(Value::Error(ErrorTag::Exc));
        }
        let mut operands = Vec::with_capacity(parts.len());
        for part in &parts {
            operands.push(self.eval_part(ctx, part)?);
        }
        if let [Operand::Value(value)] = operands.as_slice() {
            return Ok(value.clone());
        }

        let mut scope = Scope::new();
        let mut script = String::with_capacity(text.len() * 2);
        for operand in operands {
            let bound = match operand {
                Operand::Raw(raw) => {
                    script.push_str(raw);
                    continue;
                }
                // Left as text so the expression fails to evaluate.
                Operand::Value(Value::Error(tag)) => {
                    script.push(' ');
                    script.push_str(tag.as_str());
                    script.push(' ');
                    continue;
                }
                Operand::Value(Value::Number(n)) => Dynamic::from_float(n),
                Operand::Value(Value::Text(s)) => Dynamic::from(s),
            };
            let name = format!("_v{}", scope.len());
            script.push(' ');
            script.push_str(&name);
            script.push(' ');
            scope.push_constant_dynamic(name, bound);
        }

        // `//` would open a Rhai comment and drop the rest of the formula.
        let script = script.replace("//", &format!(" {FLOOR_DIV} "));
        if script.contains("/*") {
            return Ok(Value::Error(ErrorTag::Exc));
        }
        match self
            .engine
            .eval_expression_with_scope::<Dynamic>(&mut scope, &script)
        {
            Ok(result) => Ok(dynamic_to_value(result)),
            Err(err) => {
                debug!(%script, error = %err, "expression failed");
                Ok(Value::Error(ErrorTag::Exc))
            }
        }
    }

    fn eval_part<'a>(
        &mut self,
        ctx: &mut PassContext,
        part: &Part<'a>,
    ) -> Result<Operand<'a>, Unwind> {
        let value = match *part {
            Part::Literal(text) => match unquote(text) {
                Some(inner) => Value::Text(inner.to_string()),
                None => return Ok(Operand::Raw(text)),
            },
            Part::AddressLike(word) => {
                if let Some(cell) = parse_address(word) {
                    self.resolve_address(ctx, cell.key)?
                } else if let Some(n) = parse_number(word).or_else(|| named_constant(word)) {
                    finite_number(n)
                } else {
                    return Ok(Operand::Raw(word));
                }
            }
            Part::Group(inner) => self.eval_expr(ctx, inner)?,
            Part::Call { name, args } => self.call_function(ctx, name, args)?,
        };
        Ok(Operand::Value(value))
    }

    fn trip(&mut self, ctx: &PassContext, key: CellKey, trip: Trip) -> Unwind {
        match trip {
            Trip::Loop => {
                let trail = ctx.trail().to_vec();
                self.tag_loop(&trail);
                Unwind::Loop { cell: key }
            }
            Trip::Depth => Unwind::DepthExceeded { frontier: key },
        }
    }

    /// Rewrite formula cells as `#ErrLop#:=<formula>` text. Returns how many
    /// cells were tagged.
    pub(crate) fn tag_loop(&mut self, keys: &[CellKey]) -> usize {
        let mut cleared = HashSet::new();
        let mut tagged = Vec::new();
        for &key in keys {
            let Some(CellContent::Formula(expr)) = self.cells.get(&key) else {
                continue;
            };
            let marked = CellContent::Text(format!("{}:={}", ErrorTag::Loop, expr));
            self.store(key, Some(marked), &mut cleared);
            tagged.push(key);
        }
        if !tagged.is_empty() {
            let cells: Vec<String> = tagged.iter().map(CellKey::to_string).collect();
            warn!(cells = %cells.join(","), "reference loop, formula cells tagged");
        }
        tagged.len()
    }
}

/// A formula that still contains a deleted-row/column tag evaluates to it.
fn structural_tag(expr: &str) -> Option<ErrorTag> {
    [ErrorTag::Row, ErrorTag::Col]
        .into_iter()
        .find(|tag| expr.contains(tag.as_str()))
}

fn unquote(text: &str) -> Option<&str> {
    text.strip_prefix(QUOTE)?.strip_suffix(QUOTE)
}

fn parse_number(word: &str) -> Option<f64> {
    let first = word.chars().next()?;
    if !(first.is_ascii_digit() || first == '.') {
        return None;
    }
    word.parse::<f64>().ok()
}

fn named_constant(word: &str) -> Option<f64> {
    match word {
        "pi" => Some(std::f64::consts::PI),
        "e" => Some(std::f64::consts::E),
        "tau" => Some(std::f64::consts::TAU),
        _ => None,
    }
}

/// Non-finite numbers are evaluation errors.
pub(crate) fn finite_number(n: f64) -> Value {
    if n.is_finite() {
        Value::Number(n)
    } else {
        Value::Error(ErrorTag::Exc)
    }
}

fn dynamic_to_value(result: Dynamic) -> Value {
    if let Ok(n) = result.as_float() {
        finite_number(n)
    } else if let Ok(n) = result.as_int() {
        Value::Number(n as f64)
    } else if let Ok(b) = result.as_bool() {
        Value::Number(if b { 1.0 } else { 0.0 })
    } else if result.is_string() {
        result
            .into_string()
            .map(Value::Text)
            .unwrap_or(Value::Error(ErrorTag::Exc))
    } else {
        Value::Error(ErrorTag::Exc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;

    fn key(name: &str) -> CellKey {
        CellKey::from_str(name).unwrap()
    }

    fn sheet_with(cells: &[(&str, &str)]) -> Sheet {
        let mut sheet = Sheet::new();
        for (name, input) in cells {
            sheet.set_cell(key(name), input);
        }
        sheet
    }

    #[test]
    fn test_arithmetic_uses_floats() {
        let mut sheet = sheet_with(&[("A1", "7"), ("A2", "=A1/2"), ("A3", "=7/2")]);
        assert_eq!(sheet.value_of(key("A2")), Value::Number(3.5));
        assert_eq!(sheet.value_of(key("A3")), Value::Number(3.5));
    }

    #[test]
    fn test_operator_precedence_and_groups() {
        let mut sheet = sheet_with(&[("A1", "2"), ("B1", "=1 + A1 * (3 - 1)"), ("C1", "=2**3")]);
        assert_eq!(sheet.value_of(key("B1")), Value::Number(5.0));
        assert_eq!(sheet.value_of(key("C1")), Value::Number(8.0));
    }

    #[test]
    fn test_absent_cell_is_zero() {
        let mut sheet = sheet_with(&[("A1", "=Z99 + 1")]);
        assert_eq!(sheet.value_of(key("Z99")), Value::Number(0.0));
        assert_eq!(sheet.value_of(key("A1")), Value::Number(1.0));
    }

    #[test]
    fn test_text_cells() {
        let mut sheet = sheet_with(&[("A1", "hello"), ("A2", "=A1 + 1"), ("A3", "='x' + 'y'")]);
        assert_eq!(sheet.value_of(key("A1")), Value::Number(0.0));
        assert_eq!(sheet.display_value(key("A1")), "hello");
        assert_eq!(sheet.value_of(key("A2")), Value::Number(1.0));
        assert_eq!(sheet.value_of(key("A3")), Value::Text("xy".into()));
        assert!(sheet.cached(key("A1")).is_none());
        assert!(sheet.cached(key("A2")).is_some());
    }

    #[test]
    fn test_text_to_zero_disabled() {
        let config = EngineConfig {
            text_to_zero: false,
            ..EngineConfig::default()
        };
        let mut sheet = Sheet::with_config(config);
        sheet.set_cell(key("A1"), "hello");
        sheet.set_cell(key("A2"), "=A1 * 2");
        assert_eq!(sheet.value_of(key("A1")), Value::Text("hello".into()));
        assert_eq!(sheet.value_of(key("A2")), Value::Error(ErrorTag::Exc));
    }

    #[test]
    fn test_numeric_literals() {
        let mut sheet = sheet_with(&[
            ("A1", "-2.5"),
            ("A2", "1+2"),
            ("A3", "12abc"),
            ("A4", "1+A1"),
        ]);
        assert_eq!(sheet.value_of(key("A1")), Value::Number(-2.5));
        assert_eq!(sheet.value_of(key("A2")), Value::Number(3.0));
        assert_eq!(sheet.value_of(key("A3")), Value::Error(ErrorTag::Num));
        assert_eq!(sheet.value_of(key("A4")), Value::Error(ErrorTag::Num));
        assert_eq!(sheet.display_value(key("A3")), "#ErrNum#");
    }

    #[test]
    fn test_signed_exponents() {
        let mut sheet = sheet_with(&[
            ("A1", "=2*1.5e-3"),
            ("A2", "=1e-3"),
            ("A3", "=1E+2 - 1"),
            ("A4", "2e-1"),
        ]);
        assert_eq!(sheet.value_of(key("A1")), Value::Number(0.003));
        assert_eq!(sheet.value_of(key("A2")), Value::Number(0.001));
        assert_eq!(sheet.value_of(key("A3")), Value::Number(99.0));
        assert_eq!(sheet.value_of(key("A4")), Value::Number(0.2));
    }

    #[test]
    fn test_overflowing_numbers_are_errors() {
        let mut sheet = sheet_with(&[("A1", "=1e400"), ("A2", "1e400"), ("A3", "=2 * 1e400")]);
        assert_eq!(sheet.value_of(key("A1")), Value::Error(ErrorTag::Exc));
        assert_eq!(sheet.value_of(key("A2")), Value::Error(ErrorTag::Num));
        assert_eq!(sheet.display_value(key("A2")), "#ErrNum#");
        assert_eq!(sheet.value_of(key("A3")), Value::Error(ErrorTag::Exc));
    }

    #[test]
    fn test_evaluation_errors() {
        let mut sheet = sheet_with(&[
            ("A1", "=1/0"),
            ("A2", "=1 +"),
            ("A3", "=A1 + 1"),
            ("A4", "=A1"),
            ("A5", "=x = 5"),
        ]);
        assert_eq!(sheet.value_of(key("A1")), Value::Error(ErrorTag::Exc));
        assert_eq!(sheet.value_of(key("A2")), Value::Error(ErrorTag::Exc));
        assert_eq!(sheet.value_of(key("A3")), Value::Error(ErrorTag::Exc));
        assert_eq!(sheet.value_of(key("A4")), Value::Error(ErrorTag::Exc));
        assert_eq!(sheet.value_of(key("A5")), Value::Error(ErrorTag::Exc));
    }

    #[test]
    fn test_floor_division() {
        let mut sheet = sheet_with(&[
            ("A1", "7"),
            ("A2", "=A1//2"),
            ("A3", "=A1//2 + 100"),
            ("A4", "=-7//2"),
            ("A5", "=A1//2*3"),
            ("A6", "=A1//0"),
            ("A7", "=A1 /* 2"),
        ]);
        assert_eq!(sheet.value_of(key("A2")), Value::Number(3.0));
        assert_eq!(sheet.value_of(key("A3")), Value::Number(103.0));
        assert_eq!(sheet.value_of(key("A4")), Value::Number(-4.0));
        assert_eq!(sheet.value_of(key("A5")), Value::Number(9.0));
        assert_eq!(sheet.value_of(key("A6")), Value::Error(ErrorTag::Exc));
        assert_eq!(sheet.value_of(key("A7")), Value::Error(ErrorTag::Exc));
    }

    #[test]
    fn test_deep_nesting_is_error() {
        let nested = |n: usize| format!("={}1{}", "(".repeat(n), ")".repeat(n));
        let (shallow, deep) = (nested(40), nested(2000));
        let mut sheet = sheet_with(&[("A1", shallow.as_str()), ("A2", deep.as_str())]);
        assert_eq!(sheet.value_of(key("A1")), Value::Number(1.0));
        assert_eq!(sheet.value_of(key("A2")), Value::Error(ErrorTag::Exc));

        let calls = format!("={}1{}", "abs(".repeat(2000), ")".repeat(2000));
        sheet.set_cell(key("A3"), &calls);
        assert_eq!(sheet.value_of(key("A3")), Value::Error(ErrorTag::Exc));
    }

    #[test]
    fn test_cycle_longer_than_depth_budget_is_loop() {
        let mut sheet = Sheet::new();
        for row in 1..=100 {
            let next = row % 100 + 1;
            sheet.set_cell(CellKey::new(row, 1), &format!("=A{next}+1"));
        }
        assert_eq!(sheet.value_of(key("A1")), Value::Error(ErrorTag::Loop));
        for row in 1..=100 {
            let raw = sheet.raw(CellKey::new(row, 1)).unwrap();
            assert!(raw.starts_with("#ErrLop#:="), "A{row}: {raw}");
        }
    }

    #[test]
    fn test_comparisons_and_constants() {
        let mut sheet = sheet_with(&[("A1", "=3 > 2"), ("A2", "=pi * 0 + tau / 2 - pi")]);
        assert_eq!(sheet.value_of(key("A1")), Value::Number(1.0));
        assert_eq!(sheet.value_of(key("A2")), Value::Number(0.0));
    }

    #[test]
    fn test_structural_tags() {
        let mut sheet = sheet_with(&[("A1", "=#ErrRow#B1 + 1"), ("A2", "=#ErrCol#C1")]);
        assert_eq!(sheet.value_of(key("A1")), Value::Error(ErrorTag::Row));
        assert_eq!(sheet.display_value(key("A2")), "#ErrCol#");
    }

    #[test]
    fn test_fixed_addresses_evaluate() {
        let mut sheet = sheet_with(&[("A1", "4"), ("B1", "=$A$1 * A$1")]);
        assert_eq!(sheet.value_of(key("B1")), Value::Number(16.0));
    }

    #[test]
    fn test_self_reference_is_loop() {
        let mut sheet = sheet_with(&[("A1", "=A1 + 1")]);
        assert_eq!(sheet.value_of(key("A1")), Value::Error(ErrorTag::Loop));
        assert_eq!(sheet.raw(key("A1")).as_deref(), Some("#ErrLop#:=A1 + 1"));
        assert_eq!(sheet.display_value(key("A1")), "#ErrLop#:=A1 + 1");
    }

    #[test]
    fn test_long_chain_resolves_past_depth_budget() {
        let config = EngineConfig {
            max_call_depth: 8,
            ..EngineConfig::default()
        };
        let mut sheet = Sheet::with_config(config);
        sheet.set_cell(key("A1"), "1");
        for row in 2..=60 {
            sheet.set_cell(CellKey::new(row, 1), &format!("=A{} + 1", row - 1));
        }
        assert_eq!(sheet.value_of(CellKey::new(60, 1)), Value::Number(60.0));
        assert!(sheet.raw(CellKey::new(30, 1)).unwrap().starts_with('='));
    }

    #[test]
    fn test_resolve_attempts_exhausted_tags_pending() {
        let config = EngineConfig {
            max_call_depth: 2,
            resolve_attempts: 1,
            ..EngineConfig::default()
        };
        let mut sheet = Sheet::with_config(config);
        sheet.set_cell(key("A1"), "1");
        for row in 2..=20 {
            sheet.set_cell(CellKey::new(row, 1), &format!("=A{} + 1", row - 1));
        }
        assert_eq!(sheet.value_of(CellKey::new(20, 1)), Value::Error(ErrorTag::Loop));
        assert!(sheet.raw(CellKey::new(20, 1)).unwrap().starts_with("#ErrLop#"));
    }

    #[test]
    fn test_cache_is_used_and_fresh_recomputes() {
        let mut sheet = sheet_with(&[("A1", "=2 + 3")]);
        assert_eq!(sheet.value_of(key("A1")), Value::Number(5.0));
        sheet.cache().insert(key("A1"), Value::Number(99.0));
        assert_eq!(sheet.value_of(key("A1")), Value::Number(99.0));
        let fresh = sheet.evaluate(key("A1"), EvalOptions::numeric().fresh());
        assert_eq!(fresh, Value::Number(5.0));
        assert_eq!(sheet.cached(key("A1")), Some(Value::Number(5.0)));
    }
}
