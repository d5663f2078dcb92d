fn main() {
    linkclock_lib::run()
}
