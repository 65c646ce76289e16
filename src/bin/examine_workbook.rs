use abi_admissions_pipeline::extract::workbook::{cell_text, REGIONAL_SHEET_INDEX};
use calamine::{open_workbook_auto, DataType, Reader};
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let Some(file_path) = args.get(1) else {
        eprintln!("Usage: examine-workbook <file> [sheet-index]");
        std::process::exit(2);
    };

    println!("Opening workbook: {file_path}");
    let mut workbook = open_workbook_auto(file_path)?;

    let sheet_names = workbook.sheet_names().to_owned();
    println!("\nSheet names:");
    for (i, name) in sheet_names.iter().enumerate() {
        let marker = if i == REGIONAL_SHEET_INDEX { " (regional table)" } else { "" };
        println!("  {i}: {name}{marker}");
    }

    // Defaults to the sheet the extractor reads
    let index = match args.get(2) {
        Some(raw) => raw.parse::<usize>()?,
        None => REGIONAL_SHEET_INDEX,
    };
    let Some(sheet_name) = sheet_names.get(index) else {
        return Err(format!("Sheet index {index} out of range ({} sheets)", sheet_names.len()).into());
    };

    println!("\n\nExamining sheet {index}: {sheet_name}");
    println!("{}", "=".repeat(100));

    let range = workbook.worksheet_range(sheet_name)?;
    println!("Dimensions: {:?} starting at {:?}", range.get_size(), range.start());
    println!("\nFirst 60 rows (showing first 10 columns):");
    println!("{}", "=".repeat(100));

    let row_offset = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    for (row_idx, row) in range.rows().enumerate().take(60) {
        let has_data = row.iter().any(|cell| !cell.is_empty());
        if has_data {
            print!("Row {:3}: ", row_offset + row_idx + 1);
            for cell in row.iter().take(10) {
                if cell.is_empty() {
                    print!("[empty] ");
                } else {
                    print!("[{}] ", cell_text(cell));
                }
            }
            println!();
        }
    }

    Ok(())
}
