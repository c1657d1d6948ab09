use crate::error::{Result, TurtleError};

/// Coordinate space of a bulk path.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Space {
    /// Turtle space: divided by the half extent on append, validated.
    #[default]
    Logical,
    /// Already normalized to [-1, 1]^2: stored as-is, no validation.
    Device,
}

/// Borrowed input for [`TurtleMut::move_path`](super::TurtleMut::move_path).
///
/// `Flat` is an interleaved `x0, y0, x1, y1, ...` slice, the shape produced by
/// most numeric code; it is reinterpreted as points without copying.
#[derive(Debug, Copy, Clone)]
pub enum PathData<'a> {
    Points(&'a [[f32; 2]]),
    Flat(&'a [f32]),
}

impl<'a> PathData<'a> {
    /// Returns the path as points, checking shape and (for logical input) values.
    pub(crate) fn points(self, space: Space) -> Result<&'a [[f32; 2]]> {
        let points = match self {
            PathData::Points(points) => points,
            PathData::Flat(flat) => {
                if flat.len() % 2 != 0 {
                    return Err(TurtleError::InvalidGeometry(format!(
                        "flat path has {} coordinates; expected pairs of (x, y)",
                        flat.len()
                    )));
                }
                bytemuck::cast_slice(flat)
            }
        };

        if space == Space::Logical {
            validate_finite(points)?;
        }
        Ok(points)
    }
}

impl<'a> From<&'a [[f32; 2]]> for PathData<'a> {
    fn from(points: &'a [[f32; 2]]) -> Self {
        PathData::Points(points)
    }
}

impl<'a, const N: usize> From<&'a [[f32; 2]; N]> for PathData<'a> {
    fn from(points: &'a [[f32; 2]; N]) -> Self {
        PathData::Points(points)
    }
}

impl<'a> From<&'a Vec<[f32; 2]>> for PathData<'a> {
    fn from(points: &'a Vec<[f32; 2]>) -> Self {
        PathData::Points(points)
    }
}

impl<'a> From<&'a [f32]> for PathData<'a> {
    fn from(flat: &'a [f32]) -> Self {
        PathData::Flat(flat)
    }
}

impl<'a> From<&'a Vec<f32>> for PathData<'a> {
    fn from(flat: &'a Vec<f32>) -> Self {
        PathData::Flat(flat)
    }
}

pub(crate) fn validate_finite(points: &[[f32; 2]]) -> Result<()> {
    match points
        .iter()
        .position(|[x, y]| !(x.is_finite() && y.is_finite()))
    {
        None => Ok(()),
        Some(i) => Err(TurtleError::InvalidGeometry(format!(
            "point {i} is not finite: ({}, {})",
            points[i][0], points[i][1]
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_pairs_reinterpret_as_points() {
        let flat = [1.0, 2.0, 3.0, 4.0];
        let points = PathData::from(&flat[..]).points(Space::Logical).unwrap();
        assert_eq!(points, &[[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn odd_flat_length_is_invalid_in_any_space() {
        let flat = [1.0, 2.0, 3.0];
        for space in [Space::Logical, Space::Device] {
            assert!(matches!(
                PathData::from(&flat[..]).points(space),
                Err(TurtleError::InvalidGeometry(_))
            ));
        }
    }

    #[test]
    fn non_finite_logical_point_is_invalid() {
        let points = [[0.0, 0.0], [f32::NAN, 1.0]];
        let err = PathData::from(&points).points(Space::Logical).unwrap_err();
        assert!(err.to_string().contains("point 1"));
    }

    #[test]
    fn device_space_skips_value_validation() {
        let points = [[f32::INFINITY, 0.0]];
        assert!(PathData::from(&points).points(Space::Device).is_ok());
    }
}
