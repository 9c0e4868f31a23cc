fn main() {
    tilemap_renderer::run();
}
