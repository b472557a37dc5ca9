use bevy_ecs::component::Component;

/// Tags the planet entity. Its model matrix follows the controller's spin.
#[derive(Component)]
pub struct GlobeComponent;

/// Tags the translucent shell above the planet. It has a spin of its own.
#[derive(Component)]
pub struct CloudComponent;

/// Tags the entity that pins the current selection on the surface.
#[derive(Component)]
pub struct MarkerComponent {
    pub lat: f64,
    pub lng: f64,
}

/// Tags the background star field.
#[derive(Component)]
pub struct StarFieldComponent;
