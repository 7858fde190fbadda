use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use glam::Vec2;
use scenetree::node::classes::{Camera2D, Node2D, PhysicsBody2D, Sprite2D, TouchArea2D};
use scenetree::texture::Texture;
use scenetree::{InputEvent, NodeTree, TreeConfig, Variant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
	#[arg(short, long, help = "Where to save the scene. Kept in memory if absent.")]
	output: Option<PathBuf>,

	#[arg(short, long, help = "Tree config as a JSON document")]
	config: Option<PathBuf>,
}

fn build_scene(tree: &mut NodeTree) -> scenetree::NodeUuid {
	let level = tree.create(Box::new(Node2D::new("level"))).unwrap();

	let mut camera = Camera2D::default();
	camera.node_2d_mut().node_mut().set_name("camera");
	camera.make_current();
	let camera = tree.create(Box::new(camera)).unwrap();

	let mut player = Sprite2D::new("player");
	player.node_2d_mut().set_position(Vec2::new(40., 20.));
	player.set_texture(Arc::new(Texture::from_rgba(2, 2, vec![0xff; 16]).unwrap()));
	let player = tree.create(Box::new(player)).unwrap();

	let mut button = TouchArea2D::new("jump", Vec2::new(64., 32.));
	button.node_2d_mut().set_position(Vec2::new(200., 150.));
	let button = tree.create(Box::new(button)).unwrap();

	let crate_body = tree
		.create(Box::new(PhysicsBody2D::new("crate", 4., Vec2::splat(8.))))
		.unwrap();

	tree.attach(level, camera).unwrap();
	tree.attach(camera, player).unwrap();
	tree.attach(camera, crate_body).unwrap();
	tree.attach(level, button).unwrap();
	tree.connect(button, "pressed", player, "translate").unwrap();
	level
}

fn main() {
	tracing_subscriber::fmt::init();
	let cli = Cli::parse();

	let config = match &cli.config {
		Some(path) => TreeConfig::from_json(&fs::read_to_string(path).unwrap()).unwrap(),
		None => TreeConfig::default(),
	};

	let mut source = NodeTree::new().with_config(config.clone());
	let level = build_scene(&mut source);

	let data = match &cli.output {
		Some(path) => {
			let mut file = BufWriter::new(File::create(path).unwrap());
			source.save(level, &mut file).unwrap();
			file.flush().unwrap();
			fs::read(path).unwrap()
		}
		None => {
			let mut data = Vec::new();
			source.save(level, &mut data).unwrap();
			data
		}
	};
	println!("== Saved ==\n{} bytes", data.len());

	let mut tree = NodeTree::new().with_config(config);
	let report = match &cli.output {
		Some(path) => tree.load(&mut BufReader::new(File::open(path).unwrap())).unwrap(),
		None => tree.load(&mut data.as_slice()).unwrap(),
	};
	for failure in &report.failures {
		println!("failed: {} ({}): {}", failure.path, failure.class, failure.error);
	}

	let root = report.root.unwrap();
	tree.set_root(root).unwrap();
	tree.update(1. / 60.);

	let press = InputEvent::PointerDown {
		position: Vec2::new(210., 140.),
	};
	if let Some(claimer) = tree.input(&press) {
		println!("== Input ==\nclaimed by {}", tree.path(claimer).unwrap());
	}

	println!("== Nodes ==\n{tree}");
	for &id in &report.loaded {
		println!("{}", tree.inspect(id).unwrap().pretty(2));
	}
	println!(
		"player position: {:?}",
		tree.get_property(report.loaded[2], "position").unwrap_or(Variant::Nil)
	);
}
