fn main() {
    emoji_placer::run();
}
