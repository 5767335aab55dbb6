//! Connection pool status.

use serde::Serialize;

/// Snapshot of the client's connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Maximum pool capacity
    pub max_size: usize,
    /// Current connections (idle + active)
    pub size: usize,
    /// Idle connections
    pub available: usize,
    /// Tasks waiting for connections
    pub waiting: usize,
}

impl PoolStatus {
    /// Check if no caller is waiting for a connection.
    pub fn is_healthy(&self) -> bool {
        self.waiting == 0
    }

    /// Get the number of active (in-use) connections.
    pub fn active(&self) -> usize {
        self.size.saturating_sub(self.available)
    }

    /// Get pool utilization as a percentage.
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            (self.active() as f64 / self.max_size as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_status_math() {
        let status = PoolStatus { max_size: 10, size: 4, available: 1, waiting: 0 };
        assert_eq!(status.active(), 3);
        assert!((status.utilization() - 30.0).abs() < f64::EPSILON);
        assert!(status.is_healthy());

        let empty = PoolStatus { max_size: 0, size: 0, available: 0, waiting: 2 };
        assert_eq!(empty.utilization(), 0.0);
        assert!(!empty.is_healthy());
    }
}
