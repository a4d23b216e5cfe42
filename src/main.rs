fn main() -> anyhow::Result<()> {
    shelfmark_lib::run()
}
