//! Bucketization and crossing of categorical features
//!
//! Lat/lon values are bucketized against linearly spaced boundaries over a
//! fixed bounding box. Day and hour are one-hot encoded and crossed into a
//! single 168-wide indicator.

use crate::FeatureConfig;

pub const DAYS: usize = 7;
pub const HOURS: usize = 24;
pub const DAY_HOUR_BUCKETS: usize = DAYS * HOURS;

/// Sorted bucket boundaries for one continuous field
#[derive(Debug, Clone, PartialEq)]
pub struct Boundaries {
    values: Vec<f64>,
}

impl Boundaries {
    /// `n` evenly spaced boundaries from `min` to `max` inclusive
    pub fn linspace(min: f64, max: f64, n: usize) -> Self {
        let values = match n {
            0 => Vec::new(),
            1 => vec![min],
            _ => {
                let step = (max - min) / (n - 1) as f64;
                (0..n).map(|i| min + step * i as f64).collect()
            }
        };
        Boundaries { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of buckets, one more than the boundaries
    pub fn num_buckets(&self) -> usize {
        self.values.len() + 1
    }

    /// Bucket index for a value
    ///
    /// A value equal to a boundary belongs to the bucket above it. Values
    /// below the first boundary land in bucket 0 and values at or above the
    /// last in the final bucket. NaN sorts below every boundary.
    pub fn bucket(&self, value: f64) -> usize {
        self.values.partition_point(|&b| b <= value)
    }

    /// Append the one-hot encoding of `value` to `out`
    pub fn one_hot_into(&self, value: f64, out: &mut Vec<f32>) {
        one_hot_into(self.bucket(value), self.num_buckets(), out);
    }
}

/// Boundaries for the latitude and longitude fields
#[derive(Debug, Clone, PartialEq)]
pub struct GeoBuckets {
    pub lat: Boundaries,
    pub lon: Boundaries,
}

impl GeoBuckets {
    pub fn from_config(config: &FeatureConfig) -> Self {
        GeoBuckets {
            lat: Boundaries::linspace(config.lat_min, config.lat_max, config.num_boundaries),
            lon: Boundaries::linspace(config.lon_min, config.lon_max, config.num_boundaries),
        }
    }

    /// Width contributed by the four lat/lon fields
    pub fn width(&self) -> usize {
        2 * self.lat.num_buckets() + 2 * self.lon.num_buckets()
    }
}

impl Default for GeoBuckets {
    fn default() -> Self {
        Self::from_config(&FeatureConfig::default())
    }
}

fn one_hot_into(index: usize, width: usize, out: &mut Vec<f32>) {
    let start = out.len();
    out.resize(start + width, 0.0);
    out[start + index.min(width - 1)] = 1.0;
}

/// Zero-based day index, clamped into 0-6
pub fn day_index(dayofweek: i64) -> usize {
    dayofweek.clamp(0, DAYS as i64 - 1) as usize
}

/// Hour index, clamped into 0-23
pub fn hour_index(hourofday: i64) -> usize {
    hourofday.clamp(0, HOURS as i64 - 1) as usize
}

/// Collision-free day x hour index in 0-167
pub fn day_hour_index(dayofweek: i64, hourofday: i64) -> usize {
    day_index(dayofweek) * HOURS + hour_index(hourofday)
}

pub fn day_one_hot(dayofweek: i64) -> Vec<f32> {
    let mut out = Vec::with_capacity(DAYS);
    one_hot_into(day_index(dayofweek), DAYS, &mut out);
    out
}

pub fn hour_one_hot(hourofday: i64) -> Vec<f32> {
    let mut out = Vec::with_capacity(HOURS);
    one_hot_into(hour_index(hourofday), HOURS, &mut out);
    out
}

/// Append the 168-wide crossed day/hour indicator to `out`
pub fn day_hour_cross_into(dayofweek: i64, hourofday: i64, out: &mut Vec<f32>) {
    one_hot_into(day_hour_index(dayofweek, hourofday), DAY_HOUR_BUCKETS, out);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace() {
        let b = Boundaries::linspace(38.0, 42.0, 16);
        assert_eq!(b.values().len(), 16);
        assert_eq!(b.num_buckets(), 17);
        assert_eq!(b.values()[0], 38.0);
        assert!((b.values()[15] - 42.0).abs() < 1e-12);
        assert!(b.values().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_boundary_value_goes_up() {
        let b = Boundaries::linspace(0.0, 15.0, 16);
        assert_eq!(b.bucket(0.0), 1);
        assert_eq!(b.bucket(5.0), 6);
        assert_eq!(b.bucket(4.999), 5);
        assert_eq!(b.bucket(15.0), 16);
    }

    #[test]
    fn test_overflow_buckets() {
        let geo = GeoBuckets::default();
        assert_eq!(geo.lat.bucket(-90.0), 0);
        assert_eq!(geo.lat.bucket(37.99), 0);
        assert_eq!(geo.lat.bucket(42.5), 16);
        assert_eq!(geo.lat.bucket(90.0), 16);
        assert_eq!(geo.lon.bucket(-180.0), 0);
        assert_eq!(geo.lon.bucket(0.0), 16);
    }

    #[test]
    fn test_nan_lands_in_first_bucket() {
        let geo = GeoBuckets::default();
        assert_eq!(geo.lat.bucket(f64::NAN), 0);
    }

    #[test]
    fn test_one_hot_into() {
        let geo = GeoBuckets::default();
        let mut out = vec![9.0];
        geo.lat.one_hot_into(40.75, &mut out);

        assert_eq!(out.len(), 18);
        assert_eq!(out[0], 9.0);
        assert_eq!(out[1..].iter().sum::<f32>(), 1.0);
        let hot = out[1..].iter().position(|&v| v == 1.0).unwrap();
        assert_eq!(hot, geo.lat.bucket(40.75));
    }

    #[test]
    fn test_geo_width() {
        assert_eq!(GeoBuckets::default().width(), 68);
    }

    #[test]
    fn test_day_and_hour_one_hot() {
        let day = day_one_hot(2);
        assert_eq!(day.len(), 7);
        assert_eq!(day[2], 1.0);
        assert_eq!(day.iter().sum::<f32>(), 1.0);

        let hour = hour_one_hot(23);
        assert_eq!(hour.len(), 24);
        assert_eq!(hour[23], 1.0);
    }

    #[test]
    fn test_cross_is_injective() {
        let mut seen = std::collections::HashSet::new();
        for day in 0..7 {
            for hour in 0..24 {
                let idx = day_hour_index(day, hour);
                assert!(idx < DAY_HOUR_BUCKETS);
                assert!(seen.insert(idx));
            }
        }
        assert_eq!(seen.len(), 168);
    }

    #[test]
    fn test_cross_clamps_out_of_range() {
        assert_eq!(day_hour_index(-1, -5), 0);
        assert_eq!(day_hour_index(9, 30), 167);

        let mut out = Vec::new();
        day_hour_cross_into(2, 14, &mut out);
        assert_eq!(out.len(), 168);
        assert_eq!(out[2 * 24 + 14], 1.0);
    }
}
