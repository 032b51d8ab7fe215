//! Oracle
//!
//! The black-box model being explained. An oracle labels a whole batch of
//! instances at once; the explainer never calls it one row at a time.
use crate::data::{Matrix, RowMajorMatrix};
use crate::utils::argmax;

/// A black-box classifier over batches of instances.
pub trait Oracle {
    /// Return one class label per row of `data`.
    fn labels(&self, data: &Matrix<f64>) -> Vec<usize>;
}

impl<F> Oracle for F
where
    F: Fn(&Matrix<f64>) -> Vec<usize>,
{
    fn labels(&self, data: &Matrix<f64>) -> Vec<usize> {
        self(data)
    }
}

/// Adapter for oracles that return a probability vector per row.
/// Each row is labelled with its most probable class.
pub struct ProbabilityOracle<F> {
    predict_proba: F,
}

impl<F> ProbabilityOracle<F>
where
    F: Fn(&Matrix<f64>) -> RowMajorMatrix<f64>,
{
    pub fn new(predict_proba: F) -> Self {
        ProbabilityOracle { predict_proba }
    }
}

impl<F> Oracle for ProbabilityOracle<F>
where
    F: Fn(&Matrix<f64>) -> RowMajorMatrix<f64>,
{
    fn labels(&self, data: &Matrix<f64>) -> Vec<usize> {
        let proba = (self.predict_proba)(data);
        proba.row_iter().map(argmax).collect()
    }
}

/// Label a row-major batch of instances, such as freshly generated samples.
pub(crate) fn label_rows<O: Oracle + ?Sized>(oracle: &O, rows: &RowMajorMatrix<f64>) -> Vec<usize> {
    let col_major = rows.to_column_major();
    let matrix = Matrix::new(&col_major, rows.rows, rows.cols);
    oracle.labels(&matrix)
}
