fn main() {
    netmacro::cli::run();
}
