use word_distance_calculator::distance_schema;
use word_distance_calculator::levenshtein::edit_distance;
use word_distance_calculator::wordlist;

use arrow::array::{ArrayRef, PrimitiveArray, StringBuilder};
use arrow::datatypes::{UInt16Type, UInt32Type};
use arrow::error::Result as ArrowResult;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;

use crossbeam_channel::bounded;
use rayon::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use std::thread;

const ARROW_BATCH_SIZE: usize = 1 << 16;

struct DistanceDataBatch {
    idx1: Vec<u32>,
    idx2: Vec<u32>,
    dist_val: Vec<u16>,
}

impl DistanceDataBatch {
    fn new() -> Self {
        DistanceDataBatch {
            idx1: Vec::with_capacity(ARROW_BATCH_SIZE),
            idx2: Vec::with_capacity(ARROW_BATCH_SIZE),
            dist_val: Vec::with_capacity(ARROW_BATCH_SIZE),
        }
    }

    fn add(&mut self, i1: u32, i2: u32, dv: u16) {
        self.idx1.push(i1);
        self.idx2.push(i2);
        self.dist_val.push(dv);
    }

    fn is_full(&self) -> bool {
        self.idx1.len() >= ARROW_BATCH_SIZE
    }

    fn is_empty(&self) -> bool {
        self.idx1.is_empty()
    }
}

#[derive(Debug)]
struct ChannelSendError;
impl std::fmt::Display for ChannelSendError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Worker failed to send batch to writer thread")
    }
}
impl std::error::Error for ChannelSendError {}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args();
    args.next();
    let wordlist_path = args
        .next()
        .ok_or_else(|| "Usage: program <wordlist_file> <output_ipc_file> (missing wordlist_file)".to_string())?;
    let output_path = args
        .next()
        .ok_or_else(|| "Usage: program <wordlist_file> <output_ipc_file> (missing output_ipc_file)".to_string())?;

    println!("Loading word sections from: {}", wordlist_path);
    let all_sections = wordlist::load_word_sections(&wordlist_path)
        .map_err(|e| format!("Failed to load word list '{}': {}", wordlist_path, e))?;
    println!("Loaded {} word section(s).", all_sections.len());

    let schema = distance_schema();

    let file = File::create(&output_path)
        .map_err(|e| format!("Failed to create output file '{}': {}", output_path, e))?;
    let buf_writer = BufWriter::with_capacity(128 * 1024, file);
    let mut arrow_writer = FileWriter::try_new(buf_writer, &schema)?;

    let num_threads_for_pool = num_cpus::get();
    println!("Using Rayon thread pool with up to {} threads for computation.", num_threads_for_pool);

    let (tx, rx) = bounded::<(String, DistanceDataBatch)>(num_threads_for_pool.max(1) * 2);

    let writer_thread_schema = schema.clone();
    let writer_thread = thread::spawn(move || -> ArrowResult<()> {
        let mut batches_written = 0;
        let mut total_rows_written = 0;
        loop {
            match rx.recv() {
                Ok((section_name_for_batch, mut batch_data)) => {
                    let num_rows = batch_data.idx1.len();
                    if num_rows == 0 { continue; }

                    let mut section_name_builder = StringBuilder::new();
                    for _ in 0..num_rows {
                        section_name_builder.append_value(&section_name_for_batch);
                    }
                    let col_section: ArrayRef = Arc::new(section_name_builder.finish());

                    let col_idx1: ArrayRef = Arc::new(PrimitiveArray::<UInt32Type>::from(std::mem::take(&mut batch_data.idx1)));
                    let col_idx2: ArrayRef = Arc::new(PrimitiveArray::<UInt32Type>::from(std::mem::take(&mut batch_data.idx2)));
                    let col_dist_val: ArrayRef = Arc::new(PrimitiveArray::<UInt16Type>::from(std::mem::take(&mut batch_data.dist_val)));

                    let record_batch = RecordBatch::try_new(
                        writer_thread_schema.clone(),
                        vec![col_section, col_idx1, col_idx2, col_dist_val],
                    )?;
                    arrow_writer.write(&record_batch)?;
                    batches_written += 1;
                    total_rows_written += num_rows;
                    if batches_written % 100 == 0 {
                        println!("Writer thread: Written {} batches ({} rows total) to IPC file.", batches_written, total_rows_written);
                    }
                }
                Err(_) => {
                    println!("Writer thread: All data received. Finalizing Arrow file.");
                    arrow_writer.finish()?;
                    println!("Writer thread: Arrow file finished. Total batches written: {}, total rows: {}.", batches_written, total_rows_written);
                    break Ok(());
                }
            }
        }
    });

    for (section_name, words) in all_sections {
        println!("Processing section: {} ({} words)", section_name, words.len());

        if words.len() < 2 {
            eprintln!("Section {} has fewer than 2 words, nothing to compare. Skipping.", section_name);
            continue;
        }

        // Decode each word once; workers only ever read the shared vector.
        let decoded_words: Arc<Vec<Vec<char>>> =
            Arc::new(words.iter().map(|w| w.chars().collect()).collect());
        let num_words = decoded_words.len();
        let total_pairs_for_section = num_words * (num_words - 1) / 2;
        println!("  {} words in section {}, {} pairwise comparisons.", num_words, section_name, total_pairs_for_section);

        let name_for_tasks = section_name.clone();
        let tx_clone_for_section = tx.clone();

        let computation_result_for_section = (0..num_words.saturating_sub(1))
            .into_par_iter()
            .try_for_each(|idx1| -> Result<(), ChannelSendError> {
                let mut current_batch_data = DistanceDataBatch::new();
                let local_words = Arc::clone(&decoded_words);

                for idx2 in (idx1 + 1)..num_words {
                    let dist = edit_distance(&local_words[idx1], &local_words[idx2]) as u16;
                    current_batch_data.add(idx1 as u32, idx2 as u32, dist);

                    if current_batch_data.is_full() {
                        if tx_clone_for_section.send((name_for_tasks.clone(), current_batch_data)).is_err() {
                            eprintln!("Error: Worker (section {}, idx1={}) failed to send batch. Writer thread might be down.", name_for_tasks, idx1);
                            return Err(ChannelSendError);
                        }
                        current_batch_data = DistanceDataBatch::new();
                    }
                }

                if !current_batch_data.is_empty() {
                    if tx_clone_for_section.send((name_for_tasks.clone(), current_batch_data)).is_err() {
                        eprintln!("Error: Worker (section {}, idx1={}) failed to send final batch. Writer thread might be down.", name_for_tasks, idx1);
                        return Err(ChannelSendError);
                    }
                }
                Ok(())
            });

        if let Err(e) = computation_result_for_section {
            eprintln!("An error occurred processing section {}: {}. Proceeding to next section if any.", section_name, e);
        } else {
            println!("Successfully finished processing section: {}", section_name);
        }
    }

    drop(tx);

    match writer_thread.join() {
        Ok(Ok(_)) => println!("Writer thread finished successfully and Arrow IPC file finalized."),
        Ok(Err(arrow_err)) => {
            eprintln!("Writer thread failed with Arrow error: {:?}", arrow_err);
            return Err(Box::new(arrow_err));
        }
        Err(panic_payload) => {
            eprintln!("Writer thread panicked: {:?}", panic_payload);
            let panic_msg = if let Some(s) = panic_payload.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic_payload.downcast_ref::<&str>() {
                s.to_string()
            } else {
                "Writer thread panicked with an unknown type".to_string()
            };
            return Err(Box::new(std::io::Error::new(std::io::ErrorKind::Other, panic_msg)));
        }
    }

    println!("Program finished. Output written to specified IPC file.");
    Ok(())
}
