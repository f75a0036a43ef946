use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::descriptor::FaceDescriptor;
use crate::error::{FaceSearchError, Result};
use crate::store::IndexEntry;

/// 单条搜索结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueryResult {
    /// 来源图片标识
    pub source_id: String,
    /// 人脸在来源图片中的序号
    pub region_index: usize,
    /// 与查询描述符的欧氏距离
    pub distance: f32,
}

/// 线性扫描全部记录，返回距离最小的 `k` 条
///
/// 距离相同的记录保持其在 `entries` 中的先后顺序。
/// 任意一条记录的维度与查询不一致时直接报错，不做截断或补齐。
pub fn rank(query: &FaceDescriptor, entries: &[IndexEntry], k: usize) -> Result<Vec<QueryResult>> {
    if k == 0 {
        return Err(FaceSearchError::InvalidTopK(k));
    }

    let expected = query.len();
    if let Some(entry) = entries.iter().find(|entry| entry.descriptor.len() != expected) {
        return Err(FaceSearchError::DimensionMismatch {
            expected: entry.descriptor.len(),
            actual: expected,
        });
    }

    let mut distances = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| (query.distance(&entry.descriptor), i))
        .collect::<Vec<_>>();
    // sort_by 是稳定排序，相同距离按原始位置排列
    distances.sort_by(|a, b| a.0.total_cmp(&b.0));
    distances.truncate(k);

    Ok(distances
        .into_iter()
        .map(|(distance, i)| QueryResult {
            source_id: entries[i].source_id.clone(),
            region_index: entries[i].region_index,
            distance,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn entry(source_id: &str, region_index: usize, values: &[f32]) -> IndexEntry {
        IndexEntry {
            source_id: source_id.to_string(),
            region_index,
            descriptor: FaceDescriptor::new(values.to_vec()),
        }
    }

    fn sample() -> Vec<IndexEntry> {
        vec![
            entry("far.jpg", 0, &[10., 0.]),
            entry("near.jpg", 0, &[1., 0.]),
            entry("self.jpg", 0, &[0., 0.]),
            entry("mid.jpg", 2, &[0., 3.]),
        ]
    }

    #[test]
    fn test_sorted_ascending() {
        let query = FaceDescriptor::new(vec![0., 0.]);
        let result = rank(&query, &sample(), 10).unwrap();
        let ids = result.iter().map(|r| r.source_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["self.jpg", "near.jpg", "mid.jpg", "far.jpg"]);
        assert!(result.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert_eq!(result[2].region_index, 2);
        assert_eq!(result[2].distance, 3.);
    }

    #[test]
    fn test_truncate_to_k() {
        let query = FaceDescriptor::new(vec![0., 0.]);
        assert_eq!(rank(&query, &sample(), 2).unwrap().len(), 2);
        assert_eq!(rank(&query, &sample()[..3], 5).unwrap().len(), 3);
    }

    #[test]
    fn test_self_match_first() {
        let entries = sample();
        for target in &entries {
            let result = rank(&target.descriptor, &entries, 1).unwrap();
            assert_eq!(result[0].source_id, target.source_id);
            assert_eq!(result[0].distance, 0.);
        }
    }

    #[test]
    fn test_empty_store() {
        let query = FaceDescriptor::new(vec![0., 0.]);
        assert!(rank(&query, &[], 5).unwrap().is_empty());
    }

    #[test]
    fn test_ties_keep_store_order() {
        let entries = vec![
            entry("first.jpg", 0, &[1., 0.]),
            entry("other.jpg", 0, &[5., 5.]),
            entry("second.jpg", 0, &[0., 1.]),
            entry("third.jpg", 1, &[-1., 0.]),
        ];
        let query = FaceDescriptor::new(vec![0., 0.]);
        let result = rank(&query, &entries, 3).unwrap();
        let ids = result.iter().map(|r| r.source_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["first.jpg", "second.jpg", "third.jpg"]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let query = FaceDescriptor::new(vec![0., 0., 0.]);
        let err = rank(&query, &sample(), 1).unwrap_err();
        assert!(matches!(err, FaceSearchError::DimensionMismatch { expected: 2, actual: 3 }));
    }

    #[test]
    fn test_zero_k() {
        let query = FaceDescriptor::new(vec![0., 0.]);
        assert!(matches!(rank(&query, &sample(), 0), Err(FaceSearchError::InvalidTopK(0))));
    }

    #[test]
    fn test_random_stores() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in [0, 1, 3, 5, 17, 200] {
            for _ in 0..20 {
                // 坐标取值很少，保证出现大量距离相同的记录
                let entries = (0..n)
                    .map(|i| {
                        let values = [rng.random_range(0..3) as f32, rng.random_range(0..3) as f32];
                        entry(&i.to_string(), 0, &values)
                    })
                    .collect::<Vec<_>>();
                let query = FaceDescriptor::new(vec![
                    rng.random_range(0..3) as f32,
                    rng.random_range(0..3) as f32,
                ]);
                let k = match rng.random_range(0..3) {
                    0 => n.max(1),
                    1 => n + 1,
                    _ => rng.random_range(1..=n + 5),
                };

                let result = rank(&query, &entries, k).unwrap();
                assert_eq!(result.len(), k.min(n));

                let positions = result
                    .iter()
                    .map(|r| r.source_id.parse::<usize>().unwrap())
                    .collect::<Vec<_>>();
                for (w, p) in result.windows(2).zip(positions.windows(2)) {
                    assert!(w[0].distance <= w[1].distance);
                    if w[0].distance == w[1].distance {
                        assert!(p[0] < p[1]);
                    }
                }

                let mut expected = entries
                    .iter()
                    .enumerate()
                    .map(|(i, e)| (query.distance(&e.descriptor), i))
                    .collect::<Vec<_>>();
                expected.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                let expected = expected.iter().take(k).map(|(_, i)| *i).collect::<Vec<_>>();
                assert_eq!(positions, expected);
            }
        }
    }
}
