use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

/// Scalar vector operations over normalized style space.
///
/// Accumulation always runs in index order so repeated calls on the same
/// inputs return bit-identical results.
pub struct VectorOps;

impl VectorOps {
    /// Squared Euclidean distance
    pub fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        debug_assert_eq!(a.len(), b.len(), "Vector lengths must match");
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let d = x - y;
                d * d
            })
            .sum()
    }

    /// Euclidean distance
    pub fn euclidean_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        Self::squared_distance(a, b).sqrt()
    }

    /// Index of the nearest row in `centroids`; ties resolve to the lower index.
    pub fn nearest_row(point: ArrayView1<f64>, centroids: ArrayView2<f64>) -> usize {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (index, centroid) in centroids.axis_iter(Axis(0)).enumerate() {
            let distance = Self::squared_distance(point, centroid);
            if distance < best_distance {
                best = index;
                best_distance = distance;
            }
        }
        best
    }

    /// Mean of the selected rows, or `None` when no row is selected
    pub fn compute_centroid(points: ArrayView2<f64>, rows: &[usize]) -> Option<Array1<f64>> {
        if rows.is_empty() {
            return None;
        }
        let mut sum = Array1::<f64>::zeros(points.ncols());
        for &row in rows {
            sum += &points.row(row);
        }
        Some(sum / rows.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_distance_properties() {
        let a = array![0.0, 3.0, -1.0];
        let b = array![4.0, 0.0, -1.0];
        assert_eq!(VectorOps::euclidean_distance(a.view(), b.view()), 5.0);
        assert_eq!(
            VectorOps::euclidean_distance(a.view(), b.view()),
            VectorOps::euclidean_distance(b.view(), a.view())
        );
        assert_eq!(VectorOps::euclidean_distance(a.view(), a.view()), 0.0);
    }

    #[test]
    fn test_nearest_row_prefers_lower_index_on_tie() {
        let centroids = Array2::from_shape_vec((3, 1), vec![-1.0, 1.0, 5.0]).unwrap();
        let point = array![0.0];
        assert_eq!(VectorOps::nearest_row(point.view(), centroids.view()), 0);
        let point = array![4.0];
        assert_eq!(VectorOps::nearest_row(point.view(), centroids.view()), 2);
    }

    #[test]
    fn test_compute_centroid() {
        let points = Array2::from_shape_vec((3, 2), vec![0.0, 0.0, 2.0, 4.0, 10.0, 10.0]).unwrap();
        let centroid = VectorOps::compute_centroid(points.view(), &[0, 1]).unwrap();
        assert_eq!(centroid, array![1.0, 2.0]);
        assert!(VectorOps::compute_centroid(points.view(), &[]).is_none());
    }
}
