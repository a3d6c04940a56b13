//! Built-in spreadsheet functions and their metadata.
//!
//! Conventions:
//! - Names are matched case-insensitively (`SUM`, `sum`, `Sum`).
//! - Range built-ins take one or two colon-separated endpoints, optionally
//!   bracketed: `SUM(A1:B5)`, `AVG([A1:A9])`, `MAX(C3)`.
//! - Any other name must be in `NUMERIC_BUILTINS`; unknown names evaluate to
//!   `#ErrPFn#`. Their arguments are evaluated one by one, and a bare range
//!   argument expands to the values in that range.
//! - To add a built-in, extend the table and its `apply` arm.

use crate::engine::{
    CellKey, ErrorTag, PassContext, Sheet, Unwind, Value, finite_number, parse_range_arg,
    scan_addresses, split_arguments,
};

/// Aggregate computed over a range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    Product,
    Var,
    VarP,
    StdDev,
    StdDevP,
}

pub struct RangeBuiltin {
    pub sheet_name: &'static str,
    pub aggregate: Aggregate,
    pub description: &'static str,
}

pub const RANGE_BUILTINS: &[RangeBuiltin] = &[
    RangeBuiltin {
        sheet_name: "SUM",
        aggregate: Aggregate::Sum,
        description: "Sum of the values in a range",
    },
    RangeBuiltin {
        sheet_name: "AVG",
        aggregate: Aggregate::Avg,
        description: "Mean of the values in a range",
    },
    RangeBuiltin {
        sheet_name: "AVERAGE",
        aggregate: Aggregate::Avg,
        description: "Alias of AVG",
    },
    RangeBuiltin {
        sheet_name: "COUNT",
        aggregate: Aggregate::Count,
        description: "Number of non-empty cells in a range",
    },
    RangeBuiltin {
        sheet_name: "CNT",
        aggregate: Aggregate::Count,
        description: "Alias of COUNT",
    },
    RangeBuiltin {
        sheet_name: "MIN",
        aggregate: Aggregate::Min,
        description: "Smallest value in a range",
    },
    RangeBuiltin {
        sheet_name: "MAX",
        aggregate: Aggregate::Max,
        description: "Largest value in a range",
    },
    RangeBuiltin {
        sheet_name: "PRODUCT",
        aggregate: Aggregate::Product,
        description: "Product of the values in a range",
    },
    RangeBuiltin {
        sheet_name: "PROD",
        aggregate: Aggregate::Product,
        description: "Alias of PRODUCT",
    },
    RangeBuiltin {
        sheet_name: "VAR",
        aggregate: Aggregate::Var,
        description: "Sample variance (N-1) of a range",
    },
    RangeBuiltin {
        sheet_name: "VARP",
        aggregate: Aggregate::VarP,
        description: "Population variance (N) of a range",
    },
    RangeBuiltin {
        sheet_name: "STDDEV",
        aggregate: Aggregate::StdDev,
        description: "Sample standard deviation of a range",
    },
    RangeBuiltin {
        sheet_name: "STDEV",
        aggregate: Aggregate::StdDev,
        description: "Alias of STDDEV",
    },
    RangeBuiltin {
        sheet_name: "STDDEVP",
        aggregate: Aggregate::StdDevP,
        description: "Population standard deviation of a range",
    },
    RangeBuiltin {
        sheet_name: "STDEVP",
        aggregate: Aggregate::StdDevP,
        description: "Alias of STDDEVP",
    },
];

pub fn find_range_builtin(name: &str) -> Option<Aggregate> {
    RANGE_BUILTINS
        .iter()
        .find(|b| b.sheet_name.eq_ignore_ascii_case(name))
        .map(|b| b.aggregate)
}

impl Aggregate {
    /// Apply to the numbers of a range. `None` where the result is
    /// undefined (empty mean/min/max, sample variance of one value).
    pub fn apply(self, values: &[f64]) -> Option<f64> {
        let n = values.len();
        match self {
            Aggregate::Sum => Some(values.iter().sum()),
            Aggregate::Count => Some(n as f64),
            Aggregate::Product => Some(values.iter().product()),
            Aggregate::Avg => (n > 0).then(|| values.iter().sum::<f64>() / n as f64),
            Aggregate::Min => values.iter().copied().reduce(f64::min),
            Aggregate::Max => values.iter().copied().reduce(f64::max),
            Aggregate::Var => sum_sq_dev(values).filter(|_| n > 1).map(|s| s / (n - 1) as f64),
            Aggregate::VarP => sum_sq_dev(values).map(|s| s / n as f64),
            Aggregate::StdDev => Aggregate::Var.apply(values).map(f64::sqrt),
            Aggregate::StdDevP => Aggregate::VarP.apply(values).map(f64::sqrt),
        }
    }
}

/// Sum of squared deviations from the mean, two passes.
fn sum_sq_dev(values: &[f64]) -> Option<f64> {
    let mean = Aggregate::Avg.apply(values)?;
    Some(values.iter().map(|v| (v - mean).powi(2)).sum())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Between(usize, usize),
    AtLeast(usize),
}

impl Arity {
    fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::Between(lo, hi) => (lo..=hi).contains(&n),
            Arity::AtLeast(lo) => n >= lo,
        }
    }
}

pub struct NumericBuiltin {
    pub name: &'static str,
    pub arity: Arity,
}

const fn unary(name: &'static str) -> NumericBuiltin {
    NumericBuiltin {
        name,
        arity: Arity::Exact(1),
    }
}

const fn binary(name: &'static str) -> NumericBuiltin {
    NumericBuiltin {
        name,
        arity: Arity::Exact(2),
    }
}

/// The closed set of numeric functions a formula may call by name.
pub const NUMERIC_BUILTINS: &[NumericBuiltin] = &[
    unary("abs"),
    unary("fabs"),
    unary("ceil"),
    unary("floor"),
    unary("trunc"),
    unary("int"),
    unary("float"),
    NumericBuiltin {
        name: "round",
        arity: Arity::Between(1, 2),
    },
    unary("sqrt"),
    unary("exp"),
    unary("expm1"),
    NumericBuiltin {
        name: "log",
        arity: Arity::Between(1, 2),
    },
    unary("log2"),
    unary("log10"),
    unary("log1p"),
    binary("pow"),
    unary("sin"),
    unary("cos"),
    unary("tan"),
    unary("asin"),
    unary("acos"),
    unary("atan"),
    binary("atan2"),
    unary("sinh"),
    unary("cosh"),
    unary("tanh"),
    unary("asinh"),
    unary("acosh"),
    unary("atanh"),
    unary("degrees"),
    unary("radians"),
    NumericBuiltin {
        name: "hypot",
        arity: Arity::AtLeast(1),
    },
    binary("fmod"),
    binary("copysign"),
    NumericBuiltin {
        name: "min",
        arity: Arity::AtLeast(1),
    },
    NumericBuiltin {
        name: "max",
        arity: Arity::AtLeast(1),
    },
    NumericBuiltin {
        name: "fsum",
        arity: Arity::AtLeast(0),
    },
    NumericBuiltin {
        name: "prod",
        arity: Arity::AtLeast(0),
    },
    unary("factorial"),
    NumericBuiltin {
        name: "gcd",
        arity: Arity::AtLeast(0),
    },
];

pub fn find_numeric_builtin(name: &str) -> Option<&'static NumericBuiltin> {
    NUMERIC_BUILTINS
        .iter()
        .find(|b| b.name.eq_ignore_ascii_case(name))
}

impl NumericBuiltin {
    /// Apply to already-evaluated arguments. `None` on a wrong argument
    /// count or a domain error.
    pub fn call(&self, args: &[f64]) -> Option<f64> {
        if !self.arity.accepts(args.len()) {
            return None;
        }
        let x = args.first().copied().unwrap_or(0.0);
        let y = args.get(1).copied();
        let result = match self.name {
            "abs" | "fabs" => x.abs(),
            "ceil" => x.ceil(),
            "floor" => x.floor(),
            "trunc" | "int" => x.trunc(),
            "float" => x,
            "round" => round_half_even(x, y.unwrap_or(0.0))?,
            "sqrt" if x >= 0.0 => x.sqrt(),
            "exp" => x.exp(),
            "expm1" => x.exp_m1(),
            "log" if x > 0.0 => match y {
                Some(base) if base > 0.0 && base != 1.0 => x.log(base),
                Some(_) => return None,
                None => x.ln(),
            },
            "log2" if x > 0.0 => x.log2(),
            "log10" if x > 0.0 => x.log10(),
            "log1p" if x > -1.0 => x.ln_1p(),
            "pow" => x.powf(y?),
            "sin" => x.sin(),
            "cos" => x.cos(),
            "tan" => x.tan(),
            "asin" => x.asin(),
            "acos" => x.acos(),
            "atan" => x.atan(),
            "atan2" => x.atan2(y?),
            "sinh" => x.sinh(),
            "cosh" => x.cosh(),
            "tanh" => x.tanh(),
            "asinh" => x.asinh(),
            "acosh" => x.acosh(),
            "atanh" => x.atanh(),
            "degrees" => x.to_degrees(),
            "radians" => x.to_radians(),
            "hypot" => args.iter().map(|v| v * v).sum::<f64>().sqrt(),
            "fmod" => x % y?,
            "copysign" => x.copysign(y?),
            "min" => args.iter().copied().reduce(f64::min)?,
            "max" => args.iter().copied().reduce(f64::max)?,
            "fsum" => args.iter().sum(),
            "prod" => args.iter().product(),
            "factorial" => factorial(x)?,
            "gcd" => gcd_all(args)?,
            _ => return None,
        };
        Some(result)
    }
}

/// Round to `digits` decimals, ties to even.
fn round_half_even(x: f64, digits: f64) -> Option<f64> {
    if digits.fract() != 0.0 {
        return None;
    }
    let scale = 10f64.powi(digits as i32);
    Some((x * scale).round_ties_even() / scale)
}

fn factorial(x: f64) -> Option<f64> {
    if x < 0.0 || x.fract() != 0.0 || x > 170.0 {
        return None;
    }
    Some((1..=x as u32).map(f64::from).product())
}

fn gcd_all(args: &[f64]) -> Option<f64> {
    let mut acc: u64 = 0;
    for &v in args {
        if v.fract() != 0.0 || v.abs() > u64::MAX as f64 {
            return None;
        }
        let mut a = acc;
        let mut b = v.abs() as u64;
        while b != 0 {
            (a, b) = (b, a % b);
        }
        acc = a;
    }
    Some(acc as f64)
}

impl Sheet {
    /// Evaluate `name(args)`.
    pub(crate) fn call_function(
        &mut self,
        ctx: &mut PassContext,
        name: &str,
        args: &str,
    ) -> Result<Value, Unwind> {
        let reads_cells = !scan_addresses(args).is_empty();
        if reads_cells {
            ctx.descend();
        }
        // `MIN`/`MAX`/`PROD` double as numeric functions; a range argument
        // picks the aggregate.
        let result = match find_range_builtin(name) {
            Some(aggregate)
                if find_numeric_builtin(name).is_none() || parse_range_arg(args).is_some() =>
            {
                self.call_aggregate(ctx, aggregate, args)
            }
            _ => self.call_numeric(ctx, name, args),
        };
        if reads_cells {
            ctx.ascend();
        }
        result
    }

    fn call_aggregate(
        &mut self,
        ctx: &mut PassContext,
        aggregate: Aggregate,
        args: &str,
    ) -> Result<Value, Unwind> {
        let Some((start, end, _)) = parse_range_arg(args) else {
            return Ok(Value::Error(ErrorTag::Exc));
        };
        let Some(values) = self.range_numbers(ctx, start, end)? else {
            return Ok(Value::Error(ErrorTag::Exc));
        };
        Ok(aggregate
            .apply(&values)
            .map(finite_number)
            .unwrap_or(Value::Error(ErrorTag::Exc)))
    }

    fn call_numeric(
        &mut self,
        ctx: &mut PassContext,
        name: &str,
        args: &str,
    ) -> Result<Value, Unwind> {
        let Some(builtin) = find_numeric_builtin(name) else {
            return Ok(Value::Error(ErrorTag::PFn));
        };
        let mut numbers = Vec::new();
        for arg in split_arguments(args) {
            if let Some((start, end, true)) = parse_range_arg(arg) {
                match self.range_numbers(ctx, start, end)? {
                    Some(values) => numbers.extend(values),
                    None => return Ok(Value::Error(ErrorTag::Exc)),
                }
                continue;
            }
            match self.eval_expr(ctx, arg)? {
                Value::Number(n) => numbers.push(n),
                _ => return Ok(Value::Error(ErrorTag::Exc)),
            }
        }
        Ok(builtin
            .call(&numbers)
            .map(finite_number)
            .unwrap_or(Value::Error(ErrorTag::Exc)))
    }

    /// Numeric values of the present cells in a range, row-major. `None`
    /// when the range is too large or holds a non-numeric value.
    fn range_numbers(
        &mut self,
        ctx: &mut PassContext,
        start: CellKey,
        end: CellKey,
    ) -> Result<Option<Vec<f64>>, Unwind> {
        if !self.range_within_limit(start, end) {
            return Ok(None);
        }
        let mut numbers = Vec::new();
        for key in self.keys_in(start, end) {
            match self.resolve(ctx, key, self.nested_options())? {
                Value::Number(n) => numbers.push(n),
                _ => return Ok(None),
            }
        }
        Ok(Some(numbers))
    }

    fn range_within_limit(&self, start: CellKey, end: CellKey) -> bool {
        let rows = start.row.abs_diff(end.row) + 1;
        let cols = start.col.abs_diff(end.col) + 1;
        rows.checked_mul(cols)
            .is_some_and(|n| n <= self.config.max_range_cells)
    }

    /// Values in a range, row-major. Absent cells are skipped unless
    /// `include_empty` is set, in which case they read as 0.
    pub fn read_range(
        &mut self,
        start: CellKey,
        end: CellKey,
        include_empty: bool,
    ) -> Vec<(CellKey, Value)> {
        let keys = if include_empty {
            let (top_left, bottom_right) = crate::engine::normalize_range(start, end);
            (top_left.row..=bottom_right.row)
                .flat_map(|row| {
                    (top_left.col..=bottom_right.col).map(move |col| CellKey::new(row, col))
                })
                .take(self.config.max_range_cells)
                .collect()
        } else {
            self.keys_in(start, end)
        };
        keys.into_iter().map(|key| (key, self.value_of(key))).collect()
    }
}
