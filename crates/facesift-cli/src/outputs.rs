//! Post-processing outputs: bucket lists, the frequent-cluster report,
//! sample crops for large clusters, and the serialized cluster store.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use facesift_core::{
    extract_frequent, BucketReport, ClusterStore, FrequentCluster, SAMPLE_CROPS_PER_CLUSTER,
};

/// Write every persisted artifact under `out_dir`.
pub fn write_all(
    store: &ClusterStore,
    buckets: &BucketReport,
    threshold: usize,
    out_dir: &Path,
) -> Result<()> {
    let results_dir = out_dir.join("results");
    fs::create_dir_all(&results_dir)
        .with_context(|| format!("creating {}", results_dir.display()))?;

    write_lines(&results_dir.join("no-face.txt"), &buckets.no_face)?;
    write_lines(&results_dir.join("single-face.txt"), &buckets.single_face)?;
    write_lines(&results_dir.join("multi-face.txt"), &buckets.multi_face)?;

    let frequent = extract_frequent(store, threshold);
    tracing::info!(count = frequent.len(), threshold, "frequent clusters");
    write_frequent_report(&results_dir.join("frequent-clusters.txt"), &frequent)?;
    write_sample_crops(store, &frequent, out_dir)?;

    store.save(&out_dir.join("clusters.bin"))?;
    Ok(())
}

/// One path per line, in processing order.
fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))
}

/// One `<clusterId>:<memberCount>` line per frequent cluster.
fn write_frequent_report(path: &Path, frequent: &[FrequentCluster]) -> Result<()> {
    let lines: Vec<String> = frequent
        .iter()
        .map(|f| format!("{}:{}", f.id, f.member_count))
        .collect();
    write_lines(path, &lines)
}

/// Crop the first members of each frequent cluster into a per-cluster
/// preview directory. Clusters with fewer members than the sample size
/// get however many they have.
pub fn write_sample_crops(
    store: &ClusterStore,
    frequent: &[FrequentCluster],
    out_dir: &Path,
) -> Result<()> {
    for fc in frequent {
        let Some(cluster) = store.cluster(fc.id) else {
            continue;
        };
        let cluster_dir = out_dir.join(fc.id.to_string());
        fs::create_dir_all(&cluster_dir)
            .with_context(|| format!("creating {}", cluster_dir.display()))?;

        for (i, member) in cluster
            .members
            .iter()
            .take(SAMPLE_CROPS_PER_CLUSTER)
            .enumerate()
        {
            let image = image::open(&member.image_path)
                .with_context(|| format!("reading {}", member.image_path))?;
            let b = member.face_box;
            let crop = image.crop_imm(
                b.left.max(0) as u32,
                b.top.max(0) as u32,
                b.width().max(0) as u32,
                b.height().max(0) as u32,
            );

            let dest = cluster_dir.join(format!(
                "cropped_class-{}_{}-{}",
                fc.id, i, member.image_name
            ));
            crop.save(&dest)
                .with_context(|| format!("writing {}", dest.display()))?;
            tracing::info!(path = %dest.display(), "saved sample crop");
        }
    }
    Ok(())
}
