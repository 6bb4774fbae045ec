fn main() -> anyhow::Result<()> {
    aghos_installer::run()
}
