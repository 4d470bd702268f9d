fn main() {
    prost_build::compile_protos(&["proto/table_store.proto"], &["proto"])
        .expect("error compiling table_store.proto");
}
