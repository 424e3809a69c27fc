/// Errors from pagination entry points.
#[derive(Clone, Debug, PartialEq)]
pub enum PaginateError {
    /// Viewport is zero, negative, or not finite. State is left unchanged.
    DegenerateViewport {
        /// Requested width.
        width: f32,
        /// Requested height.
        height: f32,
    },
    /// A newer request superseded this run before it finished.
    Cancelled {
        /// Generation of the abandoned run.
        generation: u64,
    },
}

impl core::fmt::Display for PaginateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DegenerateViewport { width, height } => {
                write!(f, "degenerate viewport: {}x{}", width, height)
            }
            Self::Cancelled { generation } => {
                write!(f, "pagination cancelled (generation={})", generation)
            }
        }
    }
}

impl std::error::Error for PaginateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failure() {
        let err = PaginateError::DegenerateViewport {
            width: 0.0,
            height: 480.0,
        };
        assert_eq!(err.to_string(), "degenerate viewport: 0x480");
        assert_eq!(
            PaginateError::Cancelled { generation: 3 }.to_string(),
            "pagination cancelled (generation=3)"
        );
    }
}
