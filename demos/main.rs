use ole::{CompoundFile, EntriesMode, Validation};

fn main() {
    let file = "data/oledoc1.doc_";
    let cfb = CompoundFile::open_file_blocking(file, Validation::Permissive).expect("file not found");
    println!("{:#?}", cfb.root_entry());
    println!("entries: {:#?}", cfb.entries("", EntriesMode::Preorder).unwrap());
}
