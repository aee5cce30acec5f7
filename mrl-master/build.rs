fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The master serves `master.proto` and is a client of `worker.proto`.
    tonic_build::compile_protos("../protos/master.proto")?;
    tonic_build::compile_protos("../protos/worker.proto")?;
    Ok(())
}
