fn main() -> anyhow::Result<()> {
    surgiphase_lib::run()
}
