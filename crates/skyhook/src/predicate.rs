//! Serializable row predicates.

use std::fmt;

use bytes::Bytes;
use datafusion::arrow::array::BooleanArray;
use datafusion::arrow::compute::filter_record_batch;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::common::cast::as_boolean_array;
use datafusion::common::{ScalarValue, ToDFSchema};
use datafusion::logical_expr::{BinaryExpr, Expr, Operator};
use datafusion::physical_plan::PhysicalExpr;
use datafusion::prelude::{SessionContext, lit};
use datafusion_proto::bytes::Serializeable;

use crate::errors::Result;

/// A boolean expression over the columns of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    expr: Expr,
}

impl Predicate {
    pub fn new(expr: Expr) -> Self {
        Predicate { expr }
    }

    /// Predicate matching every row.
    pub fn always_true() -> Self {
        Predicate { expr: lit(true) }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn is_always_true(&self) -> bool {
        matches!(&self.expr, Expr::Literal(ScalarValue::Boolean(Some(true))))
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(self.expr.to_bytes()?)
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        Ok(Predicate {
            expr: Expr::from_bytes(buf)?,
        })
    }

    /// Evaluate the predicate for every row in `batch`.
    ///
    /// Literals are coerced to the column types of the batch.
    pub fn evaluate(&self, batch: &RecordBatch) -> Result<BooleanArray> {
        if self.is_always_true() {
            return Ok(BooleanArray::from(vec![true; batch.num_rows()]));
        }

        let df_schema = batch.schema().to_dfschema()?;
        let physical = SessionContext::new().create_physical_expr(self.expr.clone(), &df_schema)?;
        let selection = physical.evaluate(batch)?.into_array(batch.num_rows())?;

        Ok(as_boolean_array(selection.as_ref())?.clone())
    }

    /// Keep only the rows of `batch` the predicate selects. Null selections
    /// drop the row.
    pub fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        if self.is_always_true() {
            return Ok(batch.clone());
        }
        let selection = self.evaluate(batch)?;
        Ok(filter_record_batch(batch, &selection)?)
    }

    /// Collect `column = literal` terms from the top-level conjunction.
    ///
    /// For a partition predicate these are the values every row of the
    /// fragment is guaranteed to have.
    pub fn equality_guarantees(&self) -> Vec<(String, ScalarValue)> {
        let mut out = Vec::new();
        collect_equalities(&self.expr, &mut out);
        out
    }
}

fn collect_equalities(expr: &Expr, out: &mut Vec<(String, ScalarValue)>) {
    if let Expr::BinaryExpr(BinaryExpr { left, op, right }) = expr {
        match op {
            Operator::And => {
                collect_equalities(left, out);
                collect_equalities(right, out);
            }
            Operator::Eq => match (left.as_ref(), right.as_ref()) {
                (Expr::Column(col), Expr::Literal(val)) | (Expr::Literal(val), Expr::Column(col)) => {
                    out.push((col.name.clone(), val.clone()))
                }
                _ => (),
            },
            _ => (),
        }
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Self::always_true()
    }
}

impl From<Expr> for Predicate {
    fn from(expr: Expr) -> Self {
        Predicate::new(expr)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}
