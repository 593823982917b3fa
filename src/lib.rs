pub mod levenshtein;
pub mod wordlist;
#[cfg(target_arch = "wasm32")]
pub mod wasm;

use std::sync::Arc;

use arrow::array::{ArrayRef, PrimitiveArray, StringBuilder as ArrowStringBuilder};
use arrow::datatypes::{DataType, Field, Schema, UInt16Type, UInt32Type};
use arrow::error::Result as ArrowResult;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;

use serde::Serialize;

use crate::levenshtein::edit_distance;

const IPC_ARROW_BATCH_SIZE: usize = 1 << 12;
const JSON_PLOT_POINT_SAMPLE_RATE: usize = 1;

/// One computed pair: the two word indices within a section and their
/// edit distance.
pub struct ComputedDistancePoint {
    pub idx1: u32,
    pub idx2: u32,
    pub distance: u16,
}

#[derive(Serialize)]
struct JsonPlotPoint {
    x: u32,
    y: u32,
    d: u16,
}

#[derive(Serialize)]
struct SectionJsonData {
    name: String,
    max_idx: u32,
    points: Vec<JsonPlotPoint>,
}

/// Schema of the columnar distance output, shared by the in-memory IPC path
/// and the CLI file writer.
pub fn distance_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("section", DataType::Utf8, false),
        Field::new("idx1", DataType::UInt32, false),
        Field::new("idx2", DataType::UInt32, false),
        Field::new("distance", DataType::UInt16, false),
    ]))
}

fn process_sections_core<IpcH, JsonH>(
    sections: Vec<(String, Vec<String>)>,
    mut ipc_point_handler: IpcH,
    mut json_section_handler: JsonH,
    is_ipc_path: bool,
    progress: &mut dyn FnMut(&str),
) -> Result<(), String>
where
    IpcH: FnMut(&str, ComputedDistancePoint) -> Result<(), String>,
    JsonH: FnMut(SectionJsonData) -> Result<(), String>,
{
    let total_sections = sections.len();
    for (section_idx, (section_name, words)) in sections.into_iter().enumerate() {
        progress(&format!(
            "Section {}/{} '{}' ({} words)...",
            section_idx + 1,
            total_sections,
            section_name,
            words.len()
        ));

        if words.len() < 2 {
            progress(&format!(
                "Section '{}' has fewer than 2 words, nothing to compare.",
                section_name
            ));
            continue;
        }

        // Decode every word once; the pair sweep below revisits each of them
        // num_words - 1 times.
        let decoded: Vec<Vec<char>> = words.iter().map(|w| w.chars().collect()).collect();
        let num_words = decoded.len();

        let mut points_for_this_section_json: Vec<JsonPlotPoint> =
            if !is_ipc_path { Vec::new() } else { Vec::with_capacity(0) };
        let mut current_max_idx_for_section_json: u32 = 0;
        let mut point_counter_for_json_sampling = 0;
        let mut pairs_processed_for_section_progress = 0u64;
        let mut last_progress_update_idx1 = 0;

        for idx1_usize in 0..num_words.saturating_sub(1) {
            let idx1 = idx1_usize as u32;
            for idx2_usize in (idx1_usize + 1)..num_words {
                let idx2 = idx2_usize as u32;
                let dist = edit_distance(&decoded[idx1_usize], &decoded[idx2_usize]) as u16;

                let point = ComputedDistancePoint { idx1, idx2, distance: dist };

                if is_ipc_path {
                    ipc_point_handler(&section_name, point)?;
                } else {
                    point_counter_for_json_sampling += 1;
                    if point_counter_for_json_sampling % JSON_PLOT_POINT_SAMPLE_RATE == 0 {
                        points_for_this_section_json.push(JsonPlotPoint { x: idx1, y: idx2, d: dist });
                    }
                    // idx2 > idx1 throughout the sweep, so tracking idx2 suffices.
                    if idx2 > current_max_idx_for_section_json {
                        current_max_idx_for_section_json = idx2;
                    }
                }
                pairs_processed_for_section_progress += 1;
            }
            if idx1_usize > last_progress_update_idx1 + (num_words / 20).max(10)
                || idx1_usize == num_words.saturating_sub(2)
            {
                progress(&format!(
                    "Section '{}', word {}/{}. ({} pairs processed)",
                    section_name,
                    idx1_usize + 1,
                    num_words.saturating_sub(1),
                    pairs_processed_for_section_progress
                ));
                last_progress_update_idx1 = idx1_usize;
            }
        }

        if !is_ipc_path {
            json_section_handler(SectionJsonData {
                name: section_name.clone(),
                max_idx: current_max_idx_for_section_json,
                points: points_for_this_section_json,
            })?;
        }
        progress(&format!(
            "Finished section '{}'. Total pairs: {}",
            section_name, pairs_processed_for_section_progress
        ));
    }
    Ok(())
}

/// Computes all pairwise distances and returns them as a JSON plot document:
/// one object per section, each carrying its `{x, y, d}` points.
pub fn compute_plot_json(
    wordlist_content: &[u8],
    is_gzipped: bool,
    progress: &mut dyn FnMut(&str),
) -> Result<String, String> {
    progress("Loading word list...");
    let sections = wordlist::load_word_sections_from_bytes(wordlist_content, is_gzipped)
        .map_err(|e| format!("Word list parsing error: {}", e))?;
    progress(&format!("Loaded {} section(s).", sections.len()));

    let mut all_plot_data_for_json: Vec<SectionJsonData> = Vec::new();

    process_sections_core(
        sections,
        |_section_name, _point| Ok(()),
        |section_json_data| {
            all_plot_data_for_json.push(section_json_data);
            Ok(())
        },
        false,
        progress,
    )?;

    progress("Serializing plot data...");
    serde_json::to_string(&all_plot_data_for_json)
        .map_err(|e| format!("JSON serialization error: {}", e))
}

struct IpcDataBatch {
    section_names: ArrowStringBuilder,
    idx1: Vec<u32>,
    idx2: Vec<u32>,
    dist_val: Vec<u16>,
}

impl IpcDataBatch {
    fn new() -> Self {
        IpcDataBatch {
            section_names: ArrowStringBuilder::with_capacity(
                IPC_ARROW_BATCH_SIZE,
                IPC_ARROW_BATCH_SIZE * 10,
            ),
            idx1: Vec::with_capacity(IPC_ARROW_BATCH_SIZE),
            idx2: Vec::with_capacity(IPC_ARROW_BATCH_SIZE),
            dist_val: Vec::with_capacity(IPC_ARROW_BATCH_SIZE),
        }
    }

    fn add(&mut self, section_name: &str, point: &ComputedDistancePoint) {
        self.section_names.append_value(section_name);
        self.idx1.push(point.idx1);
        self.idx2.push(point.idx2);
        self.dist_val.push(point.distance);
    }

    fn is_full(&self) -> bool {
        self.idx1.len() >= IPC_ARROW_BATCH_SIZE
    }

    fn len(&self) -> usize {
        self.idx1.len()
    }

    fn write_to_arrow_and_clear(
        &mut self,
        writer: &mut FileWriter<Vec<u8>>,
        schema: &Arc<Schema>,
    ) -> ArrowResult<()> {
        if self.len() == 0 {
            return Ok(());
        }
        let col_section: ArrayRef = Arc::new(self.section_names.finish());
        let col_idx1: ArrayRef =
            Arc::new(PrimitiveArray::<UInt32Type>::from(std::mem::take(&mut self.idx1)));
        let col_idx2: ArrayRef =
            Arc::new(PrimitiveArray::<UInt32Type>::from(std::mem::take(&mut self.idx2)));
        let col_dist_val: ArrayRef =
            Arc::new(PrimitiveArray::<UInt16Type>::from(std::mem::take(&mut self.dist_val)));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![col_section, col_idx1, col_idx2, col_dist_val],
        )?;
        writer.write(&batch)?;
        Ok(())
    }
}

/// Computes all pairwise distances and returns them as a finished Arrow IPC
/// file in memory.
pub fn compute_ipc_bytes(
    wordlist_content: &[u8],
    is_gzipped: bool,
    progress: &mut dyn FnMut(&str),
) -> Result<Vec<u8>, String> {
    progress("Loading word list...");
    let sections = wordlist::load_word_sections_from_bytes(wordlist_content, is_gzipped)
        .map_err(|e| format!("Word list parsing error: {}", e))?;
    progress(&format!("Loaded {} section(s).", sections.len()));

    let schema = distance_schema();
    let ipc_buffer_owned: Vec<u8> = Vec::new();
    let mut arrow_writer = FileWriter::try_new(ipc_buffer_owned, &schema)
        .map_err(|e| format!("Arrow writer init error: {}", e))?;
    let mut current_ipc_batch = IpcDataBatch::new();

    process_sections_core(
        sections,
        |section_name_for_point, point| {
            current_ipc_batch.add(section_name_for_point, &point);
            if current_ipc_batch.is_full() {
                current_ipc_batch
                    .write_to_arrow_and_clear(&mut arrow_writer, &schema)
                    .map_err(|e| format!("IPC batch write error: {}", e))?;
            }
            Ok(())
        },
        |_section_json_data| Ok(()),
        true,
        progress,
    )?;

    if current_ipc_batch.len() > 0 {
        current_ipc_batch
            .write_to_arrow_and_clear(&mut arrow_writer, &schema)
            .map_err(|e| format!("IPC final batch write error: {}", e))?;
    }

    progress("Finalizing IPC stream...");
    let final_ipc_buffer = arrow_writer
        .into_inner()
        .map_err(|e| format!("Arrow IPC finalization error: {}", e))?;
    progress("Processing complete.");
    Ok(final_ipc_buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{StringArray, UInt16Array, UInt32Array};
    use arrow::ipc::reader::FileReader;
    use std::io::Cursor;

    fn no_progress() -> impl FnMut(&str) {
        |_: &str| {}
    }

    #[test]
    fn plot_json_holds_expected_distances() {
        let input = b"[greens]\nkale\nkales\nchard\n";
        let json = compute_plot_json(input, false, &mut no_progress()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();

        let sections = doc.as_array().unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0]["name"], "greens");
        assert_eq!(sections[0]["max_idx"], 2);

        let points = sections[0]["points"].as_array().unwrap();
        assert_eq!(points.len(), 3);
        // kale -> kales is a single insertion.
        assert_eq!(points[0]["x"], 0);
        assert_eq!(points[0]["y"], 1);
        assert_eq!(points[0]["d"], 1);
        // kale -> chard and kales -> chard.
        assert_eq!(points[1]["d"], 4);
        assert_eq!(points[2]["d"], 5);
    }

    #[test]
    fn plot_json_spans_multiple_sections() {
        let input = b"[legumes]\npea\nbean\n[greens]\nkale\nchard\n";
        let json = compute_plot_json(input, false, &mut no_progress()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();

        let sections = doc.as_array().unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0]["name"], "legumes");
        assert_eq!(sections[1]["name"], "greens");
        assert_eq!(sections[0]["points"].as_array().unwrap().len(), 1);
        assert_eq!(sections[1]["points"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn single_word_sections_produce_no_points() {
        let input = b"[lonely]\nkale\n[pair]\npea\nbean\n";
        let json = compute_plot_json(input, false, &mut no_progress()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();

        let sections = doc.as_array().unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0]["name"], "pair");
    }

    #[test]
    fn ipc_bytes_read_back_through_arrow() {
        let input = b"[greens]\nkale\nkales\nchard\n";
        let buffer = compute_ipc_bytes(input, false, &mut no_progress()).unwrap();

        let reader = FileReader::try_new(Cursor::new(buffer), None).unwrap();
        assert_eq!(
            reader.schema().fields().iter().map(|f| f.name().as_str()).collect::<Vec<_>>(),
            vec!["section", "idx1", "idx2", "distance"]
        );

        let mut sections: Vec<String> = Vec::new();
        let mut rows: Vec<(u32, u32, u16)> = Vec::new();
        for batch in reader {
            let batch = batch.unwrap();
            let section = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
            let idx1 = batch.column(1).as_any().downcast_ref::<UInt32Array>().unwrap();
            let idx2 = batch.column(2).as_any().downcast_ref::<UInt32Array>().unwrap();
            let dist = batch.column(3).as_any().downcast_ref::<UInt16Array>().unwrap();
            for row in 0..batch.num_rows() {
                sections.push(section.value(row).to_string());
                rows.push((idx1.value(row), idx2.value(row), dist.value(row)));
            }
        }

        assert!(sections.iter().all(|s| s == "greens"));
        assert_eq!(rows, vec![(0, 1, 1), (0, 2, 4), (1, 2, 5)]);
    }

    #[test]
    fn pair_indices_are_strictly_ordered() {
        let input = b"pea\nbean\nlentil\nchickpea\n";
        let buffer = compute_ipc_bytes(input, false, &mut no_progress()).unwrap();

        let reader = FileReader::try_new(Cursor::new(buffer), None).unwrap();
        let mut total_rows = 0;
        for batch in reader {
            let batch = batch.unwrap();
            let idx1 = batch.column(1).as_any().downcast_ref::<UInt32Array>().unwrap();
            let idx2 = batch.column(2).as_any().downcast_ref::<UInt32Array>().unwrap();
            for row in 0..batch.num_rows() {
                assert!(idx1.value(row) < idx2.value(row));
            }
            total_rows += batch.num_rows();
        }
        // 4 words, all unordered pairs.
        assert_eq!(total_rows, 6);
    }

    #[test]
    fn empty_wordlist_is_reported() {
        let err = compute_plot_json(b"# nothing here\n", false, &mut no_progress()).unwrap_err();
        assert!(err.contains("Word list parsing error"));
    }

    #[test]
    fn progress_messages_are_emitted() {
        let mut messages: Vec<String> = Vec::new();
        let input = b"[greens]\nkale\nchard\n";
        compute_plot_json(input, false, &mut |m: &str| messages.push(m.to_string())).unwrap();
        assert!(messages.iter().any(|m| m.contains("Loaded 1 section(s)")));
        assert!(messages.iter().any(|m| m.contains("Finished section 'greens'")));
    }
}
