//! Builds retrievable chunks from classified planning records.
//!
//! Each record produces exactly one primary chunk summarizing the
//! application, plus one chunk per appeal and per further-information
//! request. Chunk text is a deterministic natural-language synthesis
//! rather than a field dump, so embeddings capture meaning instead of
//! field labels.
//!
//! Chunk id = `{reference}-{index}`, unique across the corpus given
//! unique references and stable across rebuilds.

use sha2::{Digest, Sha256};

use crate::models::{ChunkMetadata, ClassifiedRecord, PlanningChunk};

/// Build all chunks for one classified record.
///
/// The primary chunk is always at index 0; appeal chunks follow, then
/// further-information chunks. Deterministic for a given record.
pub fn build_chunks(classified: &ClassifiedRecord) -> Vec<PlanningChunk> {
    let metadata = build_metadata(classified);
    let mut chunks = vec![make_chunk(
        classified,
        0,
        primary_text(classified),
        metadata.clone(),
    )];

    let mut index = 1i64;
    for appeal in &classified.record.appeals {
        let text = appeal_text(classified, appeal);
        chunks.push(make_chunk(classified, index, text, metadata.clone()));
        index += 1;
    }
    for fi in &classified.record.further_information {
        let text = further_info_text(classified, fi);
        chunks.push(make_chunk(classified, index, text, metadata.clone()));
        index += 1;
    }

    chunks
}

fn build_metadata(classified: &ClassifiedRecord) -> ChunkMetadata {
    ChunkMetadata {
        reference: classified.record.reference.clone(),
        location: classified.record.location.clone(),
        category: classified.category,
        land_type: classified.land_type,
        scale: classified.scale,
        decision: classified.decision.clone(),
        submitted: classified.record.submitted,
        has_appeal: !classified.record.appeals.is_empty(),
    }
}

fn make_chunk(
    classified: &ClassifiedRecord,
    index: i64,
    text: String,
    metadata: ChunkMetadata,
) -> PlanningChunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    PlanningChunk {
        id: format!("{}-{}", classified.record.reference, index),
        record_ref: classified.record.reference.clone(),
        chunk_index: index,
        text,
        hash,
        metadata,
    }
}

/// Synthesize the primary summary sentence for an application.
fn primary_text(classified: &ClassifiedRecord) -> String {
    let record = &classified.record;
    let mut parts = Vec::new();

    let mut opening = format!("Planning application {}", record.reference);
    if !record.location.trim().is_empty() {
        opening.push_str(&format!(" at {}", record.location.trim()));
    }
    if !record.proposal.trim().is_empty() {
        opening.push_str(&format!(": {}", record.proposal.trim()));
    }
    parts.push(ensure_period(opening));

    if !record.application_type.trim().is_empty() {
        parts.push(format!("Application type: {}.", record.application_type.trim()));
    }
    if let Some(date) = record.submitted {
        parts.push(format!("Submitted {}.", date.format("%Y-%m-%d")));
    }

    let mut decision = format!("Decision: {}", classified.decision);
    if let Some(date) = record.decided {
        decision.push_str(&format!(" ({})", date.format("%Y-%m-%d")));
    }
    parts.push(ensure_period(decision));

    if let Some(date) = record.granted {
        parts.push(format!("Final grant date {}.", date.format("%Y-%m-%d")));
    }
    if !record.status.trim().is_empty() {
        parts.push(format!("Current stage: {}.", record.status.trim()));
    }
    if let (Some(lat), Some(lon)) = (record.latitude, record.longitude) {
        parts.push(format!("Coordinates: {:.6}, {:.6}.", lat, lon));
    }

    parts.push(format!(
        "Classified as {} development on {}, {} scale.",
        classified.category.as_str().replace('_', " "),
        classified.land_type.as_str().replace('_', " "),
        classified.scale.as_str().replace('_', " "),
    ));

    if !record.appeals.is_empty() {
        parts.push("This application has been appealed.".to_string());
    }

    parts.join(" ")
}

fn appeal_text(classified: &ClassifiedRecord, appeal: &crate::models::AppealRecord) -> String {
    let record = &classified.record;
    let mut text = format!("Planning application {}", record.reference);
    if !record.location.trim().is_empty() {
        text.push_str(&format!(" at {}", record.location.trim()));
    }
    text.push_str(" is under appeal");
    if !appeal.reference.trim().is_empty() {
        text.push_str(&format!(" (appeal reference {})", appeal.reference.trim()));
    }
    text.push('.');
    if !appeal.status.trim().is_empty() {
        text.push_str(&format!(" Appeal status: {}.", appeal.status.trim()));
    }
    if !appeal.decision.trim().is_empty() {
        let mut dec = format!(" Appeal decision: {}", appeal.decision.trim());
        if let Some(date) = appeal.decided {
            dec.push_str(&format!(" ({})", date.format("%Y-%m-%d")));
        }
        text.push_str(&ensure_period(dec));
    }
    if !record.proposal.trim().is_empty() {
        text.push_str(&format!(" Original proposal: {}", record.proposal.trim()));
        if !text.ends_with('.') {
            text.push('.');
        }
    }
    text
}

fn further_info_text(
    classified: &ClassifiedRecord,
    fi: &crate::models::FurtherInfoRequest,
) -> String {
    let record = &classified.record;
    let mut text = format!(
        "Further information was requested for planning application {}",
        record.reference
    );
    if !record.location.trim().is_empty() {
        text.push_str(&format!(" at {}", record.location.trim()));
    }
    if let Some(date) = fi.requested {
        text.push_str(&format!(" on {}", date.format("%Y-%m-%d")));
    }
    text.push('.');
    if let Some(date) = fi.received {
        text.push_str(&format!(" The response was received on {}.", date.format("%Y-%m-%d")));
    }
    text
}

fn ensure_period(mut s: String) -> String {
    let trimmed = s.trim_end();
    if !trimmed.ends_with('.') && !trimmed.ends_with('!') && !trimmed.ends_with('?') {
        s = trimmed.to_string();
        s.push('.');
    }
    s
}
